//! Request text parser.
//!
//! Grammar, after all whitespace is removed:
//!
//! ```text
//! request    := "" | field-list | group+
//! group      := "record[" options "]" | kind "(" field-list ")"
//! kind       := "field" | "putField" | "getField"
//! field-list := entry ("," entry)*
//! entry      := name ("." name)* ("[" options "]")? ("{" field-list "}")?
//! options    := key "=" value ("," key "=" value)*
//! ```

use crate::config::CopyConfig;
use crate::error::ParseError;

use super::types::{
    Options, Request, RequestGroup, FIELD, GET_FIELD, OPTIONS_NAME, PUT_FIELD, RECORD,
};

const REQUEST_TARGET: &str = "pvcopy::request";

/// Top-level markers and the delimiters that close them.
const MARKERS: [(&str, char, char); 4] = [
    (RECORD, '[', ']'),
    (FIELD, '(', ')'),
    (PUT_FIELD, '(', ')'),
    (GET_FIELD, '(', ')'),
];

/// Request parser with length and nesting limits.
#[derive(Debug, Clone, Copy)]
pub struct RequestParser {
    max_length: usize,
    max_depth: usize,
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::from_config(&CopyConfig::default())
    }
}

impl RequestParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_length: usize, max_depth: usize) -> Self {
        Self {
            max_length,
            max_depth,
        }
    }

    pub fn from_config(config: &CopyConfig) -> Self {
        Self::with_limits(config.max_request_length, config.max_depth)
    }

    /// Parses request text into a [`Request`].
    ///
    /// Empty text selects everything. On error no partial tree is returned.
    pub fn parse(&self, text: &str) -> Result<Request, ParseError> {
        let request: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let result = self.parse_stripped(&request);
        if let Err(err) = &result {
            tracing::debug!(
                target: REQUEST_TARGET,
                error = %err,
                len = request.len(),
                "rejected request"
            );
        }
        result
    }

    fn parse_stripped(&self, request: &str) -> Result<Request, ParseError> {
        if request.len() > self.max_length {
            return Err(ParseError::TooLong {
                len: request.len(),
                limit: self.max_length,
            });
        }
        if request.is_empty() {
            return Ok(Request::default());
        }
        if find_marker(request, 0).is_none() {
            let children = self.parse_field_list(request, 1)?;
            return Ok(Request::new(
                RequestGroup::default().with_children(children),
                false,
            ));
        }

        let mut root = RequestGroup::default();
        let mut pos = 0;
        while pos < request.len() {
            let (start, marker) = match find_marker(request, pos) {
                Some(found) => found,
                None => return Err(stray_text(&request[pos..])),
            };
            if start > pos {
                return Err(stray_text(&request[pos..start]));
            }
            let (name, open, close) = marker;
            let open_at = start + name.len();
            let close_at = find_matching(request, open_at, open, close).ok_or_else(|| {
                ParseError::MissingClose {
                    delimiter: close,
                    context: request[start..].to_string(),
                }
            })?;
            let body = &request[open_at + 1..close_at];
            let group = if name == RECORD {
                let group = RequestGroup::new(RECORD);
                match parse_options(body)? {
                    Some(options) => group.with_options(options),
                    None => group,
                }
            } else {
                RequestGroup::new(name).with_children(self.parse_field_list(body, 1)?)
            };
            root.insert(group);
            pos = close_at + 1;
        }
        Ok(Request::new(root, true))
    }

    fn parse_field_list(&self, text: &str, depth: usize) -> Result<Vec<RequestGroup>, ParseError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        let mut parent = RequestGroup::default();
        for item in split_top_level(text)? {
            parent.insert(self.parse_entry(item, depth)?);
        }
        Ok(parent.children)
    }

    fn parse_entry(&self, entry: &str, depth: usize) -> Result<RequestGroup, ParseError> {
        let path_end = entry.find(['[', '{']).unwrap_or(entry.len());
        let (path, mut rest) = entry.split_at(path_end);
        if path.is_empty() {
            return Err(ParseError::EmptyFieldName(entry.to_string()));
        }
        let steps: Vec<&str> = path.split('.').collect();
        for step in &steps {
            validate_name(step, entry)?;
        }
        let leaf_depth = depth + steps.len() - 1;
        if leaf_depth > self.max_depth {
            return Err(ParseError::TooDeep(self.max_depth));
        }

        let mut options = None;
        let mut children = Vec::new();
        if rest.starts_with('[') {
            let close = find_matching(rest, 0, '[', ']').ok_or_else(|| ParseError::MissingClose {
                delimiter: ']',
                context: entry.to_string(),
            })?;
            options = parse_options(&rest[1..close])?;
            rest = &rest[close + 1..];
        }
        if rest.starts_with('{') {
            let close = find_matching(rest, 0, '{', '}').ok_or_else(|| ParseError::MissingClose {
                delimiter: '}',
                context: entry.to_string(),
            })?;
            children = self.parse_field_list(&rest[1..close], leaf_depth + 1)?;
            rest = &rest[close + 1..];
        }
        if !rest.is_empty() {
            return Err(stray_text(rest));
        }

        let (leaf, parents) = steps
            .split_last()
            .ok_or_else(|| ParseError::EmptyFieldName(entry.to_string()))?;
        let mut group = RequestGroup::new(*leaf).with_children(children);
        group.options = options;
        for name in parents.iter().rev() {
            group = RequestGroup::new(*name).with_children(vec![group]);
        }
        Ok(group)
    }
}

/// Parses `text` with the default limits.
///
/// ```
/// use pvcopy::parse_request;
///
/// let request = parse_request("record[process=true]field(value,alarm{severity})").unwrap();
/// assert_eq!(request.record_options().unwrap()["process"], "true");
/// let field = request.selection("field");
/// assert_eq!(field.children.len(), 2);
/// assert!(field.find("alarm.severity").is_some());
/// ```
pub fn parse_request(text: &str) -> Result<Request, ParseError> {
    RequestParser::new().parse(text)
}

/// Earliest top-level marker at or after `from`.
fn find_marker(text: &str, from: usize) -> Option<(usize, (&'static str, char, char))> {
    MARKERS
        .iter()
        .filter_map(|&(name, open, close)| {
            let pattern = format!("{}{}", name, open);
            text[from..]
                .find(&pattern)
                .map(|i| (from + i, (name, open, close)))
        })
        .min_by_key(|(at, _)| *at)
}

/// Index of the `close` matching the `open` at `open_at`, counting nested
/// pairs of the same delimiter.
fn find_matching(text: &str, open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[open_at..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(open_at + i);
            }
        }
    }
    None
}

/// Splits a field list on commas outside `[]` and `{}`.
fn split_top_level(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut expected: Vec<char> = Vec::new();
    let mut items = Vec::new();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match c {
            '[' => expected.push(']'),
            '{' => expected.push('}'),
            ']' | '}' => {
                if expected.pop() != Some(c) {
                    return Err(ParseError::Unmatched {
                        delimiter: c,
                        context: text.to_string(),
                    });
                }
            }
            ',' if expected.is_empty() => {
                items.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if let Some(&delimiter) = expected.last() {
        return Err(ParseError::MissingClose {
            delimiter,
            context: text.to_string(),
        });
    }
    items.push(&text[start..]);
    if items.iter().any(|item| item.is_empty()) {
        return Err(ParseError::EmptyFieldName(text.to_string()));
    }
    Ok(items)
}

fn validate_name(name: &str, entry: &str) -> Result<(), ParseError> {
    if name.is_empty() {
        return Err(ParseError::EmptyFieldName(entry.to_string()));
    }
    if name == OPTIONS_NAME {
        return Err(ParseError::ReservedName);
    }
    if name.contains(['(', '=']) {
        return Err(ParseError::UnexpectedText(entry.to_string()));
    }
    if let Some(delimiter) = name.chars().find(|c| matches!(c, ')' | ']' | '}')) {
        return Err(ParseError::Unmatched {
            delimiter,
            context: entry.to_string(),
        });
    }
    Ok(())
}

fn stray_text(text: &str) -> ParseError {
    match text.chars().find(|c| matches!(c, ')' | ']' | '}')) {
        Some(delimiter) => ParseError::Unmatched {
            delimiter,
            context: text.to_string(),
        },
        None => ParseError::UnexpectedText(text.to_string()),
    }
}

/// Parses `key=value,...`; empty text means no options.
fn parse_options(text: &str) -> Result<Option<Options>, ParseError> {
    if text.is_empty() {
        return Ok(None);
    }
    let mut options = Options::new();
    for pair in text.split(',') {
        let mut parts = pair.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) if !key.is_empty() => {
                options.insert(key.to_string(), value.to_string());
            }
            _ => return Err(ParseError::MalformedOption(pair.to_string())),
        }
    }
    Ok(Some(options))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(groups: &[RequestGroup]) -> Vec<&str> {
        groups.iter().map(|g| g.name.as_str()).collect()
    }

    #[test]
    fn test_empty_is_wildcard() {
        let request = parse_request("  \n\t").unwrap();
        assert!(request.is_empty());
        assert!(!request.is_grouped());
    }

    #[test]
    fn test_plain_field_list() {
        let request = parse_request("value, alarm.severity, timeStamp").unwrap();
        assert!(!request.is_grouped());
        assert_eq!(names(&request.root().children), vec!["value", "alarm", "timeStamp"]);
        assert_eq!(names(&request.root().find("alarm").unwrap().children), vec!["severity"]);
    }

    #[test]
    fn test_dotted_path_with_options_and_subfields() {
        let request = parse_request("field(a.b[x=1]{c,d})").unwrap();
        let b = request.selection(FIELD).find("a.b").unwrap();
        assert_eq!(b.option("x"), Some("1"));
        assert_eq!(names(&b.children), vec!["c", "d"]);
        assert!(request.selection(FIELD).child("a").unwrap().options.is_none());
    }

    #[test]
    fn test_markers_in_text_order() {
        let request = parse_request("getField(b)record[q=1]putField(a)").unwrap();
        assert_eq!(names(&request.root().children), vec![GET_FIELD, RECORD, PUT_FIELD]);
        assert_eq!(request.selection(PUT_FIELD).children[0].name, "a");
        assert_eq!(request.selection(GET_FIELD).children[0].name, "b");
    }

    #[test]
    fn test_repeated_group_merges() {
        let request = parse_request("field(a)field(b)").unwrap();
        assert_eq!(names(&request.selection(FIELD).children), vec!["a", "b"]);
    }

    #[test]
    fn test_nested_parentheses_in_group() {
        let err = parse_request("field(a(b))").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedText(_)));
    }

    #[test]
    fn test_unmatched_close() {
        assert_eq!(
            parse_request("a}").unwrap_err(),
            ParseError::Unmatched {
                delimiter: '}',
                context: "a}".into()
            }
        );
        assert!(matches!(
            parse_request("field(a))").unwrap_err(),
            ParseError::Unmatched { delimiter: ')', .. }
        ));
        assert!(matches!(
            parse_request("field(a{b]})").unwrap_err(),
            ParseError::Unmatched { delimiter: ']', .. }
        ));
    }

    #[test]
    fn test_missing_close() {
        assert!(matches!(
            parse_request("record[a=b").unwrap_err(),
            ParseError::MissingClose { delimiter: ']', .. }
        ));
        assert!(matches!(
            parse_request("a[x=1").unwrap_err(),
            ParseError::MissingClose { delimiter: ']', .. }
        ));
    }

    #[test]
    fn test_malformed_options() {
        for text in ["record[a]", "record[a=b=c]", "value[=1]", "value[a=1,]"] {
            assert!(
                matches!(parse_request(text), Err(ParseError::MalformedOption(_))),
                "{}",
                text
            );
        }
        let request = parse_request("value[a=]").unwrap();
        assert_eq!(request.root().children[0].option("a"), Some(""));
    }

    #[test]
    fn test_empty_names() {
        for text in ["a,,b", ",a", "a.", "a..b", "field(a,)"] {
            assert!(
                matches!(parse_request(text), Err(ParseError::EmptyFieldName(_))),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_reserved_name() {
        assert_eq!(parse_request("a._options").unwrap_err(), ParseError::ReservedName);
    }

    #[test]
    fn test_stray_text_around_groups() {
        assert_eq!(
            parse_request("value,field(a)").unwrap_err(),
            ParseError::UnexpectedText("value,".into())
        );
        assert_eq!(
            parse_request("field(a)x").unwrap_err(),
            ParseError::UnexpectedText("x".into())
        );
    }

    #[test]
    fn test_limits() {
        let parser = RequestParser::with_limits(8, 2);
        assert_eq!(
            parser.parse("abcdefghi").unwrap_err(),
            ParseError::TooLong { len: 9, limit: 8 }
        );
        assert!(parser.parse("a .b").is_ok());
        assert_eq!(parser.parse("a.b.c").unwrap_err(), ParseError::TooDeep(2));
        assert_eq!(parser.parse("a{b{c}}").unwrap_err(), ParseError::TooDeep(2));
    }
}
