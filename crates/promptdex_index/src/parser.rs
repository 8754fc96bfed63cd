//! Prompt document header parsing.
//!
//! A document may start with a YAML header block:
//!
//! ```text
//! ---
//! title: Code review
//! description: Ask for a careful review
//! tags: [review, rust]
//! ---
//! # Body heading
//! ...
//! ```
//!
//! Parsing never fails. A header that is not valid YAML, or not a mapping, is
//! ignored and the whole input is treated as body text.

use indexmap::IndexSet;
use serde_yaml::{Mapping, Value};

const HEADER_DELIMITER: &str = "---";

/// Metadata extracted from one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    pub title: String,
    pub description: Option<String>,
    pub tags: IndexSet<String>,
    /// Text after the header block (the whole input when there is no header)
    pub body: String,
}

/// Parse a document's header, falling back to its first heading or `fallback_name`.
pub fn parse_document(raw: &str, fallback_name: &str) -> ParsedDocument {
    let text = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let (header, body) = match split_header(text) {
        Some((yaml, body)) => match parse_header(yaml) {
            Some(mapping) => (Some(mapping), body),
            None => {
                tracing::debug!(name = fallback_name, "Ignoring malformed header block");
                (None, text)
            }
        },
        None => (None, text),
    };

    let header_title = header
        .as_ref()
        .and_then(|h| h.get("title"))
        .and_then(scalar_to_string);
    let description = header
        .as_ref()
        .and_then(|h| h.get("description"))
        .and_then(scalar_to_string);
    let tags = header
        .as_ref()
        .and_then(|h| h.get("tags"))
        .map(collect_tags)
        .unwrap_or_default();

    let title = header_title
        .or_else(|| first_heading(body))
        .unwrap_or_else(|| humanize_name(fallback_name));

    ParsedDocument {
        title,
        description,
        tags,
        body: body.to_string(),
    }
}

/// Split `text` into (header yaml, body) if it opens with a delimited header.
fn split_header(text: &str) -> Option<(&str, &str)> {
    let first_end = text.find('\n')?;
    if text[..first_end].trim_end_matches('\r') != HEADER_DELIMITER {
        return None;
    }

    let rest = &text[first_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let bare = line.trim_end_matches('\n').trim_end_matches('\r');
        if bare == HEADER_DELIMITER {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

fn parse_header(yaml: &str) -> Option<Mapping> {
    if yaml.trim().is_empty() {
        return Some(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => Some(mapping),
        Ok(Value::Null) => Some(Mapping::new()),
        _ => None,
    }
}

/// Non-empty trimmed text of a scalar value.
fn scalar_to_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn collect_tags(value: &Value) -> IndexSet<String> {
    let raw: Vec<String> = match value {
        Value::Sequence(items) => items.iter().filter_map(scalar_to_string).collect(),
        Value::String(s) => s.split(',').map(str::to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    };

    raw.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Text of the first ATX heading (`#` through `######`) in `body`.
fn first_heading(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let trimmed = line.trim_start();
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if level == 0 || level > 6 {
            return None;
        }
        let rest = &trimmed[level..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let heading = rest.trim().trim_end_matches('#').trim();
        if heading.is_empty() {
            None
        } else {
            Some(heading.to_string())
        }
    })
}

/// `code-review_notes` -> `code review notes`
fn humanize_name(name: &str) -> String {
    name.replace(['-', '_'], " ")
}
