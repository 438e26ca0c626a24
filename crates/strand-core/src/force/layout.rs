use std::collections::HashMap;
use std::sync::Arc;

use glam::{Affine3A, Vec3};
use noise::Perlin;
use smallvec::SmallVec;

use super::builtin::{curl_noise, point_force, vortex_force};
use super::{CustomForceFn, ForceContext, ForceKind, ForceSample, ForceSchema, ForceSet};

/// Seed of the noise field shared by every curl-noise instance.
pub const CURL_NOISE_SEED: u32 = 0x5eed;

/// One row of the force lookup table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LayoutEntry {
    pub kind_id: u32,
    /// offset in floats into the flat buffer
    pub offset: usize,
}

impl LayoutEntry {
    pub fn byte_offset(&self) -> usize {
        self.offset * std::mem::size_of::<f32>()
    }
}

/// Space conversions available to force evaluation.
#[derive(Copy, Clone, Debug)]
pub struct EvalContext {
    pub time: f32,
    pub local_to_world: Affine3A,
    pub world_to_local: Affine3A,
}

impl EvalContext {
    pub fn new(ctx: &ForceContext) -> Self {
        Self {
            time: ctx.time,
            local_to_world: ctx.local_to_world,
            world_to_local: ctx.local_to_world.inverse(),
        }
    }
}

impl Default for EvalContext {
    fn default() -> Self {
        Self::new(&ForceContext::default())
    }
}

/// Offsets of an active force set in the flat buffer.
///
/// Built when the set changes. The buffer itself is refilled every frame with
/// [`ForceLayout::flatten_into`] since derived fields may depend on time.
pub struct ForceLayout {
    entries: SmallVec<[LayoutEntry; 8]>,
    kinds: SmallVec<[(ForceKind, Arc<ForceSchema>); 4]>,
    float_count: usize,
    generation: u64,
    custom: HashMap<u32, CustomForceFn>,
    noise: Perlin,
}

impl ForceLayout {
    pub fn new(set: &ForceSet) -> Self {
        let mut entries = SmallVec::new();
        let mut kinds: SmallVec<[(ForceKind, Arc<ForceSchema>); 4]> = SmallVec::new();
        let mut custom = HashMap::new();
        let mut offset = 0;

        for instance in set.instances() {
            let descriptor = instance.descriptor();
            entries.push(LayoutEntry {
                kind_id: descriptor.kind.id(),
                offset,
            });
            offset += instance.float_count();

            if !kinds.iter().any(|(k, _)| *k == descriptor.kind) {
                kinds.push((descriptor.kind, descriptor.schema.clone()));
                if let Some(f) = &descriptor.evaluator {
                    custom.insert(descriptor.kind.id(), f.clone());
                }
            }
        }

        let skipped = kinds
            .iter()
            .filter(|(k, _)| !k.is_builtin() && !custom.contains_key(&k.id()))
            .count();
        log::debug!(
            "force layout: {} instances, {} distinct kinds ({} without cpu evaluator), {} floats",
            entries.len(),
            kinds.len(),
            skipped,
            offset
        );

        Self {
            entries,
            kinds,
            float_count: offset,
            generation: set.generation(),
            custom,
            noise: Perlin::new(CURL_NOISE_SEED),
        }
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Distinct kinds of the set, in order of first appearance.
    pub fn kinds(&self) -> impl Iterator<Item = (ForceKind, &ForceSchema)> {
        self.kinds.iter().map(|(k, s)| (*k, s.as_ref()))
    }

    pub fn float_count(&self) -> usize {
        self.float_count
    }

    /// Generation of the [`ForceSet`] this layout was built from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Rewrites `buffer` wholesale with the current field values of `set`.
    pub fn flatten_into(&self, set: &ForceSet, ctx: &ForceContext, buffer: &mut Vec<f32>) {
        debug_assert_eq!(set.generation(), self.generation, "stale force layout");
        buffer.clear();
        buffer.reserve(self.float_count);
        for instance in set.instances() {
            instance.flatten_into(ctx, buffer);
        }
    }

    /// Sums every active force on one control point, in batch-local space.
    pub fn accumulate(&self, buffer: &[f32], sample: &ForceSample, ctx: &EvalContext) -> Vec3 {
        accumulate_table(&self.entries, buffer, sample, ctx, &self.noise, &self.custom)
    }
}

/// Switch over the table rows. Kind ids without a known evaluation are
/// skipped.
pub fn accumulate_table(
    entries: &[LayoutEntry],
    buffer: &[f32],
    sample: &ForceSample,
    ctx: &EvalContext,
    noise: &Perlin,
    custom: &HashMap<u32, CustomForceFn>,
) -> Vec3 {
    let world_p = ctx.local_to_world.transform_point3(sample.position);
    let to_local = |v: Vec3| ctx.world_to_local.transform_vector3(v);
    let mut acc = Vec3::ZERO;

    for entry in entries {
        let r = &buffer[entry.offset..];
        let v3 = |i: usize| Vec3::new(r[i], r[i + 1], r[i + 2]);
        acc += match ForceKind::from_id(entry.kind_id) {
            Some(ForceKind::Gravity) => to_local(v3(0)),
            Some(ForceKind::CurlNoise) => {
                to_local(curl_noise(noise, world_p, ctx.time, r[0], r[1], r[2]))
            }
            Some(ForceKind::Point) => to_local(point_force(world_p, v3(0), r[3], r[4], r[5])),
            Some(ForceKind::Vortex) => {
                to_local(vortex_force(world_p, v3(0), v3(3), r[6], r[7], r[8]))
            }
            Some(ForceKind::Custom(_)) => match custom.get(&entry.kind_id) {
                Some(f) => f(r, sample, ctx),
                None => Vec3::ZERO,
            },
            None => Vec3::ZERO,
        };
    }
    acc
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::force::{FieldSource, FieldType, ForceRegistry, ForceSchema};

    fn sample_at(position: Vec3) -> ForceSample {
        ForceSample {
            position,
            velocity: Vec3::ZERO,
            tangent: Vec3::Y,
        }
    }

    fn gravity(registry: &ForceRegistry, g: Vec3) -> crate::force::ForceInstance {
        registry
            .instantiate(ForceKind::Gravity, [("acceleration", g.into())])
            .unwrap()
    }

    #[test]
    fn offsets_follow_schema_widths() {
        let registry = ForceRegistry::with_builtins();
        let point = registry
            .instantiate(
                ForceKind::Point,
                [
                    ("position", Vec3::ZERO.into()),
                    ("strength", 1f32.into()),
                    ("falloff_distance", 1f32.into()),
                    ("falloff_power", 1f32.into()),
                ],
            )
            .unwrap();
        let set = ForceSet::from_instances(vec![
            gravity(&registry, Vec3::NEG_Y),
            point,
            gravity(&registry, Vec3::X),
        ])
        .unwrap();
        let layout = ForceLayout::new(&set);
        let offsets: Vec<_> = layout.entries().iter().map(|e| e.offset).collect();
        assert_eq!(offsets, vec![0, 3, 9]);
        assert_eq!(layout.entries()[2].byte_offset(), 36);
        assert_eq!(layout.float_count(), 12);
        assert_eq!(layout.kinds().count(), 2);

        let mut buffer = Vec::new();
        layout.flatten_into(&set, &ForceContext::default(), &mut buffer);
        assert_eq!(buffer.len(), 12);
    }

    #[test]
    fn gravity_sums_in_local_space() {
        let registry = ForceRegistry::with_builtins();
        let set = ForceSet::from_instances(vec![
            gravity(&registry, Vec3::new(0., -9.81, 0.)),
            gravity(&registry, Vec3::new(1., 0., 0.)),
        ])
        .unwrap();
        let layout = ForceLayout::new(&set);
        let ctx = ForceContext {
            local_to_world: Affine3A::from_rotation_z(std::f32::consts::FRAC_PI_2),
            ..Default::default()
        };
        let mut buffer = Vec::new();
        layout.flatten_into(&set, &ctx, &mut buffer);
        let f = layout.accumulate(&buffer, &sample_at(Vec3::ZERO), &EvalContext::new(&ctx));
        // world (1, -9.81, 0) seen from a frame rotated a quarter turn about Z
        assert!((f - Vec3::new(-9.81, -1., 0.)).length() < 1e-4, "{f}");
    }

    #[test]
    fn unknown_kind_ids_are_skipped() {
        let entries = [
            LayoutEntry {
                kind_id: 9,
                offset: 0,
            },
            LayoutEntry {
                kind_id: ForceKind::Gravity.id(),
                offset: 3,
            },
            LayoutEntry {
                kind_id: ForceKind::Custom(4).id(),
                offset: 0,
            },
        ];
        let buffer = [100., 100., 100., 0., -1., 0.];
        let f = accumulate_table(
            &entries,
            &buffer,
            &sample_at(Vec3::ZERO),
            &EvalContext::default(),
            &Perlin::new(0),
            &HashMap::new(),
        );
        assert_eq!(f, Vec3::new(0., -1., 0.));
    }

    #[test]
    fn custom_evaluator_reads_its_record() {
        let mut registry = ForceRegistry::with_builtins();
        let evaluator: CustomForceFn =
            Arc::new(|record: &[f32], sample: &ForceSample, _: &EvalContext| {
                -sample.velocity * record[0]
            });
        let kind = registry
            .register_custom(
                1,
                ForceSchema::new().with_field("damping", FieldType::Scalar),
                Some(evaluator),
            )
            .unwrap();
        let damping = registry
            .instantiate(kind, [("damping", FieldSource::from(0.5))])
            .unwrap();
        let set = ForceSet::from_instances(vec![gravity(&registry, Vec3::ZERO), damping]).unwrap();
        let layout = ForceLayout::new(&set);
        let mut buffer = Vec::new();
        layout.flatten_into(&set, &ForceContext::default(), &mut buffer);
        let sample = ForceSample {
            position: Vec3::ZERO,
            velocity: Vec3::new(2., 0., 0.),
            tangent: Vec3::Y,
        };
        let f = layout.accumulate(&buffer, &sample, &EvalContext::default());
        assert_eq!(f, Vec3::new(-1., 0., 0.));
    }
}
