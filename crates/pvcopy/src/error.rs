use pvdata::PvDataError;
use thiserror::Error;

/// Errors raised while parsing request text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("'{context}' has an unmatched '{delimiter}'")]
    Unmatched { delimiter: char, context: String },
    #[error("'{context}' does not have a matching '{delimiter}'")]
    MissingClose { delimiter: char, context: String },
    #[error("malformed option '{0}': expected name=value")]
    MalformedOption(String),
    #[error("empty field name in '{0}'")]
    EmptyFieldName(String),
    #[error("'_options' is reserved and cannot name a field")]
    ReservedName,
    #[error("unexpected text '{0}'")]
    UnexpectedText(String),
    #[error("request is {len} bytes long, the limit is {limit}")]
    TooLong { len: usize, limit: usize },
    #[error("request nesting exceeds the limit of {0}")]
    TooDeep(usize),
}

/// Errors raised while building or running a copy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CopyError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Data(#[from] PvDataError),
    #[error("request does not select any field of the master structure")]
    NoFields,
    #[error("copy offset {offset} is outside the copy structure of {len} fields")]
    OffsetOutOfRange { offset: usize, len: usize },
}
