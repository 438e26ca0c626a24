//! Schema-described force plugins.
//!
//! A force kind is registered once with an ordered field schema. Instances of
//! a kind hold one [`FieldSource`] per field, either a constant or a pure
//! function of the [`ForceContext`]. Every frame the active [`ForceSet`] is
//! flattened into a single `f32` buffer, see [`layout::ForceLayout`].

pub mod builtin;
pub mod codegen;
pub mod layout;
pub mod spec;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Affine3A, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::StrandError;
pub use layout::{EvalContext, ForceLayout, LayoutEntry};

/// Size of the force lookup table.
pub const MAX_FORCES: usize = 32;

/// Ids below this value are reserved for built-in kinds.
pub const CUSTOM_KIND_BASE: u32 = 16;
/// Largest custom id whose table id still fits in a `u32`.
pub const MAX_CUSTOM_ID: u32 = u32::MAX - CUSTOM_KIND_BASE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceKind {
    Gravity,
    CurlNoise,
    Point,
    Vortex,
    Custom(u32),
}

impl ForceKind {
    pub const BUILTIN: [ForceKind; 4] = [
        ForceKind::Gravity,
        ForceKind::CurlNoise,
        ForceKind::Point,
        ForceKind::Vortex,
    ];

    /// Numeric id stored in the force table.
    pub fn id(self) -> u32 {
        match self {
            ForceKind::Gravity => 0,
            ForceKind::CurlNoise => 1,
            ForceKind::Point => 2,
            ForceKind::Vortex => 3,
            ForceKind::Custom(n) => CUSTOM_KIND_BASE + n,
        }
    }

    pub fn from_id(id: u32) -> Option<ForceKind> {
        match id {
            0 => Some(ForceKind::Gravity),
            1 => Some(ForceKind::CurlNoise),
            2 => Some(ForceKind::Point),
            3 => Some(ForceKind::Vortex),
            n if n >= CUSTOM_KIND_BASE => Some(ForceKind::Custom(n - CUSTOM_KIND_BASE)),
            _ => None,
        }
    }

    pub fn is_builtin(self) -> bool {
        !matches!(self, ForceKind::Custom(_))
    }

    /// snake_case identifier, used for generated shader symbols.
    pub fn name(self) -> String {
        match self {
            ForceKind::Gravity => "gravity".into(),
            ForceKind::CurlNoise => "curl_noise".into(),
            ForceKind::Point => "point".into(),
            ForceKind::Vortex => "vortex".into(),
            ForceKind::Custom(n) => format!("custom_{n}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
}

impl FieldType {
    /// Number of floats this field occupies in the flat buffer.
    pub fn width(self) -> usize {
        match self {
            FieldType::Scalar => 1,
            FieldType::Vec2 => 2,
            FieldType::Vec3 => 3,
            FieldType::Vec4 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Scalar(_) => FieldType::Scalar,
            FieldValue::Vec2(_) => FieldType::Vec2,
            FieldValue::Vec3(_) => FieldType::Vec3,
            FieldValue::Vec4(_) => FieldType::Vec4,
        }
    }

    pub fn write_to(&self, out: &mut Vec<f32>) {
        match *self {
            FieldValue::Scalar(x) => out.push(x),
            FieldValue::Vec2(v) => out.extend_from_slice(&v.to_array()),
            FieldValue::Vec3(v) => out.extend_from_slice(&v.to_array()),
            FieldValue::Vec4(v) => out.extend_from_slice(&v.to_array()),
        }
    }

    /// Decodes a value of type `ty` from the start of `data`.
    pub fn read(ty: FieldType, data: &[f32]) -> Self {
        match ty {
            FieldType::Scalar => FieldValue::Scalar(data[0]),
            FieldType::Vec2 => FieldValue::Vec2(Vec2::from_slice(data)),
            FieldType::Vec3 => FieldValue::Vec3(Vec3::from_slice(data)),
            FieldType::Vec4 => FieldValue::Vec4(Vec4::from_slice(data)),
        }
    }
}

impl From<f32> for FieldValue {
    fn from(x: f32) -> Self {
        FieldValue::Scalar(x)
    }
}

impl From<Vec2> for FieldValue {
    fn from(v: Vec2) -> Self {
        FieldValue::Vec2(v)
    }
}

impl From<Vec3> for FieldValue {
    fn from(v: Vec3) -> Self {
        FieldValue::Vec3(v)
    }
}

impl From<Vec4> for FieldValue {
    fn from(v: Vec4) -> Self {
        FieldValue::Vec4(v)
    }
}

/// What a derived field can see when it is resolved.
#[derive(Copy, Clone, Debug)]
pub struct ForceContext {
    pub time: f32,
    pub dt: f32,
    pub frame: u64,
    pub local_to_world: Affine3A,
}

impl Default for ForceContext {
    fn default() -> Self {
        Self {
            time: 0.,
            dt: 1. / 60.,
            frame: 0,
            local_to_world: Affine3A::IDENTITY,
        }
    }
}

pub type DeriveFn = Arc<dyn Fn(&ForceContext) -> FieldValue + Send + Sync>;

#[derive(Clone)]
pub enum FieldSource {
    Constant(FieldValue),
    Derived(DeriveFn),
}

impl FieldSource {
    pub fn derived(f: impl Fn(&ForceContext) -> FieldValue + Send + Sync + 'static) -> Self {
        FieldSource::Derived(Arc::new(f))
    }

    pub fn resolve(&self, ctx: &ForceContext) -> FieldValue {
        match self {
            FieldSource::Constant(v) => *v,
            FieldSource::Derived(f) => f(ctx),
        }
    }
}

impl fmt::Debug for FieldSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSource::Constant(v) => write!(f, "Constant({v:?})"),
            FieldSource::Derived(_) => write!(f, "Derived(..)"),
        }
    }
}

macro_rules! constant_source_from {
    ($($t:ty),*) => {
        $(impl From<$t> for FieldSource {
            fn from(v: $t) -> Self {
                FieldSource::Constant(v.into())
            }
        })*
    };
}

constant_source_from!(f32, Vec2, Vec3, Vec4, FieldValue);

/// Ordered field layout of a force kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ForceSchema {
    fields: SmallVec<[(String, FieldType); 6]>,
}

impl ForceSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, ty: FieldType) -> Self {
        self.fields.push((name.into(), ty));
        self
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = (&str, FieldType)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), *t))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn float_count(&self) -> usize {
        self.fields.iter().map(|(_, t)| t.width()).sum()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    /// Float offset of a field inside one record.
    pub fn offset_of(&self, name: &str) -> Option<usize> {
        let i = self.index_of(name)?;
        Some(self.fields[..i].iter().map(|(_, t)| t.width()).sum())
    }

    /// Decodes one flattened record back into named values.
    pub fn decode<'a>(&'a self, record: &[f32]) -> Vec<(&'a str, FieldValue)> {
        let mut offset = 0;
        let mut result = Vec::with_capacity(self.fields.len());
        for (name, ty) in &self.fields {
            result.push((name.as_str(), FieldValue::read(*ty, &record[offset..])));
            offset += ty.width();
        }
        result
    }

    fn check_unique(&self) -> Result<(), StrandError> {
        for (i, (name, _)) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|(n, _)| n == name) {
                return Err(StrandError::DuplicateField {
                    field: name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Inputs a force sees for one control point.
#[derive(Copy, Clone, Debug)]
pub struct ForceSample {
    /// batch-local position
    pub position: Vec3,
    /// batch-local velocity, per second
    pub velocity: Vec3,
    pub tangent: Vec3,
}

/// CPU evaluator of a custom kind: reads its record and returns a local-space
/// acceleration.
pub type CustomForceFn = Arc<dyn Fn(&[f32], &ForceSample, &EvalContext) -> Vec3 + Send + Sync>;

#[derive(Clone)]
pub struct ForceDescriptor {
    pub kind: ForceKind,
    pub schema: Arc<ForceSchema>,
    pub evaluator: Option<CustomForceFn>,
}

impl fmt::Debug for ForceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceDescriptor")
            .field("kind", &self.kind)
            .field("schema", &self.schema)
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct ForceRegistry {
    descriptors: HashMap<ForceKind, ForceDescriptor>,
}

impl Default for ForceRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ForceRegistry {
    /// A registry without any kind, not even the built-in ones.
    pub fn new() -> Self {
        Self {
            descriptors: HashMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for kind in ForceKind::BUILTIN {
            registry.descriptors.insert(
                kind,
                ForceDescriptor {
                    kind,
                    schema: Arc::new(builtin::schema(kind)),
                    evaluator: None,
                },
            );
        }
        registry
    }

    /// Fixes the field layout of `kind`. Built-in kinds only accept their own
    /// schema since their evaluation reads fields at fixed offsets.
    pub fn register(&mut self, kind: ForceKind, schema: ForceSchema) -> Result<(), StrandError> {
        self.insert(kind, schema, None)
    }

    pub fn register_custom(
        &mut self,
        id: u32,
        schema: ForceSchema,
        evaluator: Option<CustomForceFn>,
    ) -> Result<ForceKind, StrandError> {
        let kind = ForceKind::Custom(id);
        self.insert(kind, schema, evaluator)?;
        Ok(kind)
    }

    fn insert(
        &mut self,
        kind: ForceKind,
        schema: ForceSchema,
        evaluator: Option<CustomForceFn>,
    ) -> Result<(), StrandError> {
        if let ForceKind::Custom(id) = kind {
            if id > MAX_CUSTOM_ID {
                return Err(StrandError::CustomIdOutOfRange {
                    id,
                    max: MAX_CUSTOM_ID,
                });
            }
        }
        if self.descriptors.contains_key(&kind) {
            return Err(StrandError::DuplicateForce { kind });
        }
        schema.check_unique()?;
        if kind.is_builtin() && schema != builtin::schema(kind) {
            return Err(StrandError::SchemaMismatch { kind });
        }
        log::debug!(
            "registered force kind {kind:?} ({} floats)",
            schema.float_count()
        );
        self.descriptors.insert(
            kind,
            ForceDescriptor {
                kind,
                schema: Arc::new(schema),
                evaluator,
            },
        );
        Ok(())
    }

    pub fn descriptor(&self, kind: ForceKind) -> Option<&ForceDescriptor> {
        self.descriptors.get(&kind)
    }

    pub fn contains(&self, kind: ForceKind) -> bool {
        self.descriptors.contains_key(&kind)
    }

    /// Builds an instance from named field values. Every schema field must be
    /// given exactly once; constant values are type-checked here.
    pub fn instantiate<'a>(
        &self,
        kind: ForceKind,
        values: impl IntoIterator<Item = (&'a str, FieldSource)>,
    ) -> Result<ForceInstance, StrandError> {
        let descriptor = self
            .descriptor(kind)
            .ok_or(StrandError::UnregisteredForce { kind })?;
        let schema = &descriptor.schema;

        let mut slots: SmallVec<[Option<FieldSource>; 6]> = SmallVec::from_elem(None, schema.len());
        for (name, source) in values {
            let Some(i) = schema.index_of(name) else {
                return Err(StrandError::UnknownField {
                    kind,
                    field: name.to_string(),
                });
            };
            let expected = schema.fields[i].1;
            if let FieldSource::Constant(v) = &source {
                if v.field_type() != expected {
                    return Err(StrandError::FieldTypeMismatch {
                        kind,
                        field: name.to_string(),
                        expected,
                        found: v.field_type(),
                    });
                }
            }
            slots[i] = Some(source);
        }

        let mut fields = SmallVec::new();
        for (slot, (name, _)) in slots.into_iter().zip(schema.fields()) {
            match slot {
                Some(source) => fields.push(source),
                None => {
                    return Err(StrandError::MissingField {
                        kind,
                        field: name.to_string(),
                    })
                }
            }
        }

        Ok(ForceInstance {
            descriptor: descriptor.clone(),
            fields,
        })
    }
}

/// One configured force. Read-only once built.
#[derive(Clone)]
pub struct ForceInstance {
    descriptor: ForceDescriptor,
    fields: SmallVec<[FieldSource; 6]>,
}

impl fmt::Debug for ForceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForceInstance")
            .field("kind", &self.descriptor.kind)
            .field("fields", &self.fields)
            .finish()
    }
}

impl ForceInstance {
    pub fn kind(&self) -> ForceKind {
        self.descriptor.kind
    }

    pub fn schema(&self) -> &ForceSchema {
        &self.descriptor.schema
    }

    pub fn descriptor(&self) -> &ForceDescriptor {
        &self.descriptor
    }

    pub fn float_count(&self) -> usize {
        self.descriptor.schema.float_count()
    }

    pub fn flatten(&self, ctx: &ForceContext) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.float_count());
        self.flatten_into(ctx, &mut out);
        out
    }

    /// Appends exactly `float_count()` floats, in schema order.
    pub fn flatten_into(&self, ctx: &ForceContext, out: &mut Vec<f32>) {
        for (source, (_, ty)) in self.fields.iter().zip(self.descriptor.schema.fields()) {
            let value = source.resolve(ctx);
            let start = out.len();
            assert_eq!(value.field_type(), ty, "derived field returned the wrong type");
            value.write_to(out);
            debug_assert_eq!(out.len(), start + ty.width());
        }
    }
}

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Ordered list of active forces. Every mutation stamps a new generation so
/// that consumers know when the layout must be rebuilt.
#[derive(Clone, Debug)]
pub struct ForceSet {
    instances: Vec<ForceInstance>,
    generation: u64,
}

impl Default for ForceSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ForceSet {
    pub fn new() -> Self {
        Self {
            instances: Vec::new(),
            generation: next_generation(),
        }
    }

    pub fn from_instances(instances: Vec<ForceInstance>) -> Result<Self, StrandError> {
        if instances.len() > MAX_FORCES {
            return Err(StrandError::TooManyForces {
                count: instances.len(),
                max: MAX_FORCES,
            });
        }
        Ok(Self {
            instances,
            generation: next_generation(),
        })
    }

    pub fn push(&mut self, instance: ForceInstance) -> Result<(), StrandError> {
        if self.instances.len() >= MAX_FORCES {
            return Err(StrandError::TooManyForces {
                count: self.instances.len() + 1,
                max: MAX_FORCES,
            });
        }
        self.instances.push(instance);
        self.generation = next_generation();
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> ForceInstance {
        let removed = self.instances.remove(index);
        self.generation = next_generation();
        removed
    }

    pub fn clear(&mut self) {
        self.instances.clear();
        self.generation = next_generation();
    }

    pub fn instances(&self) -> &[ForceInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn wind_schema() -> ForceSchema {
        ForceSchema::new()
            .with_field("direction", FieldType::Vec3)
            .with_field("gust", FieldType::Vec2)
            .with_field("strength", FieldType::Scalar)
            .with_field("color", FieldType::Vec4)
    }

    #[test]
    fn flatten_roundtrip() {
        let mut registry = ForceRegistry::new();
        let kind = registry.register_custom(0, wind_schema(), None).unwrap();
        assert_eq!(registry.descriptor(kind).unwrap().schema.float_count(), 10);

        let values = [
            ("direction", FieldValue::Vec3(Vec3::new(1., -2., 3.5))),
            ("gust", FieldValue::Vec2(Vec2::new(0.25, 8.))),
            ("strength", FieldValue::Scalar(-4.)),
            ("color", FieldValue::Vec4(Vec4::new(0.1, 0.2, 0.3, 0.4))),
        ];
        // given out of order on purpose
        let instance = registry
            .instantiate(
                kind,
                values.iter().rev().map(|(n, v)| (*n, FieldSource::Constant(*v))),
            )
            .unwrap();

        let flat = instance.flatten(&ForceContext::default());
        assert_eq!(flat.len(), 10);
        let decoded = instance.schema().decode(&flat);
        assert_eq!(decoded, values.to_vec());
    }

    #[test]
    fn derived_fields_see_context() {
        let registry = ForceRegistry::with_builtins();
        let instance = registry
            .instantiate(
                ForceKind::Point,
                [
                    ("position", Vec3::ZERO.into()),
                    ("strength", FieldSource::derived(|ctx| (2. * ctx.time).into())),
                    ("falloff_distance", 1f32.into()),
                    ("falloff_power", 1f32.into()),
                ],
            )
            .unwrap();
        let ctx = ForceContext {
            time: 1.5,
            ..Default::default()
        };
        assert_eq!(instance.flatten(&ctx), vec![0., 0., 0., 3., 1., 1.]);
    }

    #[test]
    fn unregistered_kind_is_rejected() {
        let registry = ForceRegistry::new();
        let err = registry
            .instantiate(ForceKind::Gravity, [("acceleration", Vec3::ZERO.into())])
            .unwrap_err();
        assert_eq!(
            err,
            StrandError::UnregisteredForce {
                kind: ForceKind::Gravity
            }
        );
    }

    #[test]
    fn registration_errors() {
        let mut registry = ForceRegistry::with_builtins();
        assert_eq!(
            registry.register(ForceKind::Gravity, builtin::schema(ForceKind::Gravity)),
            Err(StrandError::DuplicateForce {
                kind: ForceKind::Gravity
            })
        );

        let mut empty = ForceRegistry::new();
        assert!(matches!(
            empty.register(ForceKind::Vortex, wind_schema()),
            Err(StrandError::SchemaMismatch { .. })
        ));
        assert!(empty
            .register(ForceKind::Vortex, builtin::schema(ForceKind::Vortex))
            .is_ok());

        let dup = ForceSchema::new()
            .with_field("a", FieldType::Scalar)
            .with_field("a", FieldType::Vec3);
        assert!(matches!(
            empty.register_custom(3, dup, None),
            Err(StrandError::DuplicateField { .. })
        ));
    }

    #[test]
    fn field_checks() {
        let registry = ForceRegistry::with_builtins();
        assert!(matches!(
            registry.instantiate(ForceKind::Gravity, [("acceleration", 1f32.into())]),
            Err(StrandError::FieldTypeMismatch { .. })
        ));
        assert!(matches!(
            registry.instantiate(ForceKind::Gravity, std::iter::empty()),
            Err(StrandError::MissingField { .. })
        ));
        assert!(matches!(
            registry.instantiate(
                ForceKind::Gravity,
                [("acceleration", Vec3::Y.into()), ("wind", 1f32.into())]
            ),
            Err(StrandError::UnknownField { .. })
        ));
    }

    #[test]
    fn force_set_capacity_and_generation() {
        let registry = ForceRegistry::with_builtins();
        let gravity = registry
            .instantiate(ForceKind::Gravity, [("acceleration", Vec3::NEG_Y.into())])
            .unwrap();
        let mut set = ForceSet::new();
        let g0 = set.generation();
        for _ in 0..MAX_FORCES {
            set.push(gravity.clone()).unwrap();
        }
        assert_ne!(set.generation(), g0);
        assert!(matches!(
            set.push(gravity.clone()),
            Err(StrandError::TooManyForces { .. })
        ));
        assert!(ForceSet::from_instances(vec![gravity; MAX_FORCES + 1]).is_err());
    }

    #[test]
    fn custom_ids_past_the_table_range_are_rejected() {
        let mut registry = ForceRegistry::new();
        assert_eq!(
            registry.register_custom(u32::MAX - 2, wind_schema(), None),
            Err(StrandError::CustomIdOutOfRange {
                id: u32::MAX - 2,
                max: MAX_CUSTOM_ID,
            })
        );
        assert!(matches!(
            registry.register(ForceKind::Custom(MAX_CUSTOM_ID + 1), wind_schema()),
            Err(StrandError::CustomIdOutOfRange { .. })
        ));
        assert!(!registry.contains(ForceKind::Custom(u32::MAX - 2)));

        let kind = registry.register_custom(MAX_CUSTOM_ID, wind_schema(), None).unwrap();
        assert_eq!(kind.id(), u32::MAX);
        assert_eq!(ForceKind::from_id(kind.id()), Some(kind));
    }

    #[test]
    #[should_panic(expected = "derived field returned the wrong type")]
    fn derived_field_of_the_wrong_width_panics() {
        let registry = ForceRegistry::with_builtins();
        let instance = registry
            .instantiate(
                ForceKind::Gravity,
                [("acceleration", FieldSource::derived(|ctx| ctx.time.into()))],
            )
            .unwrap();
        instance.flatten(&ForceContext::default());
    }

    #[test]
    fn kind_ids() {
        for kind in ForceKind::BUILTIN {
            assert_eq!(ForceKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ForceKind::from_id(CUSTOM_KIND_BASE + 7), Some(ForceKind::Custom(7)));
        assert_eq!(ForceKind::from_id(9), None);
    }
}
