//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent malformed input data or invalid values.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("unexpected end of PBF data: reading {wanted} byte(s) at position {pos} goes past end at {end}")]
    UnexpectedEof { pos: usize, wanted: usize, end: usize },

    #[error("varint at position {0} is longer than 10 bytes")]
    VarintOverflow(usize),

    #[error("unsupported wire type {0}")]
    UnsupportedWireType(u8),

    #[error("field {tag} has wire type {actual}, expected {expected}")]
    WireTypeMismatch {
        tag: u32,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("length delimited wire types cannot be packed")]
    PackedLengthDelimited,

    #[error("invalid UTF-8 in string field {0}")]
    InvalidUtf8(u32),

    #[error("unexpected tag {tag} while decoding {context}")]
    UnexpectedTag { context: &'static str, tag: u32 },

    #[error("layer missing name, but name is required")]
    LayerMissingName,

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("feature tag index {index} out of range in layer {layer}")]
    TagIndexOutOfRange { layer: String, index: u32 },

    #[error("invalid tile coordinate: {0}")]
    InvalidTileCoord(String),

    #[error("line {line}: {message}")]
    InvalidTileList { line: usize, message: String },

    #[error("invalid treemap data: {0}")]
    InvalidTree(String),

    #[error("opacity must be within [0, 1], got {0}")]
    InvalidOpacity(f64),

    #[error("percentile must be within [0, 100], got {0}")]
    InvalidPercentile(f64),
}
