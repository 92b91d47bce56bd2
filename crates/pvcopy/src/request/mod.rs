//! Field-selection requests: the tree types and the text parser.

mod parser;
mod types;

pub use parser::{parse_request, RequestParser};
pub use types::{Options, Request, RequestGroup, FIELD, GET_FIELD, OPTIONS_NAME, PUT_FIELD, RECORD};
