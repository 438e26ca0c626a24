//! Setup-time errors.
//!
//! Everything here is raised while building registries, force sets and
//! batches. Per-frame passes never fail: numeric degeneracies are recovered
//! in place and sampler exhaustion just yields fewer samples.

use std::fmt;

use crate::force::ForceKind;
use crate::force::FieldType;

#[derive(Debug, Clone, PartialEq)]
pub enum StrandError {
    /// A force kind was instantiated before its schema was registered.
    UnregisteredForce { kind: ForceKind },
    /// A custom kind id too large to be offset into the force table.
    CustomIdOutOfRange { id: u32, max: u32 },
    /// A schema was registered twice for the same kind.
    DuplicateForce { kind: ForceKind },
    /// A built-in kind was registered with a schema other than its own.
    SchemaMismatch { kind: ForceKind },
    /// A schema declares the same field name twice.
    DuplicateField { field: String },
    /// A field value was given for a name the schema does not declare.
    UnknownField { kind: ForceKind, field: String },
    /// A field declared by the schema received no value.
    MissingField { kind: ForceKind, field: String },
    /// A constant field value does not have the declared width.
    FieldTypeMismatch {
        kind: ForceKind,
        field: String,
        expected: FieldType,
        found: FieldType,
    },
    /// More active force instances than the fixed force table can hold.
    TooManyForces { count: usize, max: usize },
    /// A strand needs at least one segment.
    TooFewControlPoints { count: usize },
    /// Control points per strand over the fixed local-array bound.
    TooManyControlPoints { count: usize, max: usize },
    /// Resampled curve points per strand over the fixed bound.
    TooManyCurvePoints { count: usize, max: usize },
    /// Strands of one batch must all have the same number of control points.
    ControlPointMismatch {
        strand: usize,
        expected: usize,
        found: usize,
    },
    /// A cross-section polygon needs at least 3 points.
    InvalidCrossSection { count: usize },
    /// A numeric parameter is out of its valid range.
    InvalidParameter { name: &'static str, value: f32 },
    /// Surface attribute streams disagree in length.
    SurfaceMismatch {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    /// The triangle index stream is not a multiple of 3 or points past the vertices.
    InvalidTriangles,
    /// A configuration file could not be parsed.
    Config(String),
}

impl fmt::Display for StrandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrandError::UnregisteredForce { kind } => {
                write!(f, "force kind {kind:?} has no registered schema")
            }
            StrandError::CustomIdOutOfRange { id, max } => {
                write!(f, "custom force id {id} exceeds the maximum of {max}")
            }
            StrandError::DuplicateForce { kind } => {
                write!(f, "force kind {kind:?} is already registered")
            }
            StrandError::SchemaMismatch { kind } => {
                write!(f, "built-in force kind {kind:?} only accepts its own schema")
            }
            StrandError::DuplicateField { field } => {
                write!(f, "field `{field}` is declared twice")
            }
            StrandError::UnknownField { kind, field } => {
                write!(f, "force kind {kind:?} has no field `{field}`")
            }
            StrandError::MissingField { kind, field } => {
                write!(f, "force kind {kind:?} is missing a value for `{field}`")
            }
            StrandError::FieldTypeMismatch {
                kind,
                field,
                expected,
                found,
            } => write!(
                f,
                "field `{field}` of {kind:?} expects {expected:?}, got {found:?}"
            ),
            StrandError::TooManyForces { count, max } => {
                write!(f, "{count} active forces exceed the maximum of {max}")
            }
            StrandError::TooFewControlPoints { count } => {
                write!(f, "strands need at least 2 control points, got {count}")
            }
            StrandError::TooManyControlPoints { count, max } => {
                write!(f, "{count} control points exceed the maximum of {max}")
            }
            StrandError::TooManyCurvePoints { count, max } => {
                write!(f, "{count} curve points per strand exceed the maximum of {max}")
            }
            StrandError::ControlPointMismatch {
                strand,
                expected,
                found,
            } => write!(
                f,
                "strand {strand} has {found} control points, batch uses {expected}"
            ),
            StrandError::InvalidCrossSection { count } => {
                write!(f, "cross-section needs at least 3 points, got {count}")
            }
            StrandError::InvalidParameter { name, value } => {
                write!(f, "invalid value {value} for `{name}`")
            }
            StrandError::SurfaceMismatch {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "surface attribute `{attribute}` has {found} entries, expected {expected}"
            ),
            StrandError::InvalidTriangles => write!(f, "invalid triangle index stream"),
            StrandError::Config(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for StrandError {}

impl From<toml::de::Error> for StrandError {
    fn from(e: toml::de::Error) -> Self {
        StrandError::Config(e.to_string())
    }
}
