use thiserror::Error;

/// Errors raised by schema construction and structure access.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PvDataError {
    #[error("field '{0}' is not a structure")]
    NotAStructure(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("duplicate field name '{0}'")]
    DuplicateField(String),
    #[error("type mismatch for '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },
    #[error("cannot copy '{src}' into '{dst}': field shapes differ")]
    ShapeMismatch { dst: String, src: String },
    #[error("offset {offset} is out of range for a structure with {len} fields")]
    OffsetOutOfRange { offset: usize, len: usize },
    #[error("field builder: {0}")]
    Builder(&'static str),
}
