//! Debug file grammar (format v1)
//!
//! Every literal of the on-disk format lives here, together with the value
//! codec. The writer only uses the `render_*`/`encode_*` half and the reader
//! only uses the `parse_*`/`decode_*` half, so a change to the format is a
//! change to this one file.
//!
//! ```text
//! ╔════════════════════════════════════════════════════════════════╗
//! ║ Debug Session - parser
//! ║ Context ID: parser-4242-1700000000000000000
//! ║ PID: 4242
//! ║ Started: 2024-01-01 12:00:00
//! ║ Format: v1
//! ╚════════════════════════════════════════════════════════════════╝
//! [2024-01-01 12:00:00.123] SNAPSHOT | parser | dev@box:4242 | parser-4242-1700000000000000000
//!   EVENT: token-read
//!   CALL SITE: lexer.rs:88
//!   STATE:
//!     token: IDENT
//! ---
//! ```

use crate::entry::{EntryType, StateValue};
use chrono::NaiveDateTime;

/// Current format version, written into the session banner
pub const FORMAT_VERSION: u32 = 1;

/// Entry header timestamp layout
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Banner start-time layout
pub const BANNER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fallback for anything that could not be resolved
pub const UNKNOWN: &str = "unknown";

pub const SEPARATOR: &str = "---";
pub const FIELD_DELIMITER: &str = " | ";
pub const EVENT_PREFIX: &str = "EVENT:";
pub const CALL_SITE_PREFIX: &str = "CALL SITE:";
pub const STATE_HEADER: &str = "STATE:";

const SECTION_INDENT: &str = "  ";
const STATE_INDENT: &str = "    ";

pub const BANNER_TOP: &str =
    "╔════════════════════════════════════════════════════════════════╗";
pub const BANNER_BOTTOM: &str =
    "╚════════════════════════════════════════════════════════════════╝";
pub const BANNER_EDGE: &str = "║ ";
pub const BANNER_TITLE: &str = "Debug Session - ";
pub const BANNER_CONTEXT: &str = "Context ID: ";
pub const BANNER_PID: &str = "PID: ";
pub const BANNER_STARTED: &str = "Started: ";
pub const BANNER_FORMAT: &str = "Format: v";

// ============================================================================
// Banner
// ============================================================================

/// Session banner written once when a debug file is created
pub fn render_banner(component: &str, context_id: &str, pid: u32, started: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str(BANNER_TOP);
    out.push('\n');
    for line in [
        format!("{}{}", BANNER_TITLE, sanitize_field(component)),
        format!("{}{}", BANNER_CONTEXT, escape_text(context_id)),
        format!("{}{}", BANNER_PID, pid),
        format!("{}{}", BANNER_STARTED, started.format(BANNER_TIMESTAMP_FORMAT)),
        format!("{}{}", BANNER_FORMAT, FORMAT_VERSION),
    ] {
        out.push_str(BANNER_EDGE);
        out.push_str(&line);
        out.push('\n');
    }
    out.push_str(BANNER_BOTTOM);
    out.push('\n');
    out
}

/// Parse a banner timestamp
pub fn parse_banner_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s.trim(), BANNER_TIMESTAMP_FORMAT).ok()
}

// ============================================================================
// Entry header line
// ============================================================================

/// The six correlation points of an entry header
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderLine {
    pub timestamp: NaiveDateTime,
    pub entry_type: EntryType,
    pub component: String,
    pub origin: String,
    pub context_id: String,
}

/// `[timestamp] TYPE | component | user@host:pid | context-id`
pub fn render_header_line(
    timestamp: NaiveDateTime,
    entry_type: EntryType,
    component: &str,
    origin: &str,
    context_id: &str,
) -> String {
    format!(
        "[{}] {}{}{}{}{}{}{}\n",
        timestamp.format(TIMESTAMP_FORMAT),
        entry_type.as_str(),
        FIELD_DELIMITER,
        sanitize_field(component),
        FIELD_DELIMITER,
        sanitize_field(origin),
        FIELD_DELIMITER,
        escape_text(context_id),
    )
}

/// True when a raw line has the shape of an entry header
pub fn looks_like_header(line: &str) -> bool {
    line.starts_with('[') && line.contains("] ")
}

/// Parse an entry header line; `None` if any of the six points is missing
/// or the type tag is not recognized
pub fn parse_header_line(line: &str) -> Option<HeaderLine> {
    let rest = line.strip_prefix('[')?;
    let (timestamp, rest) = rest.split_once("] ")?;
    let timestamp = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).ok()?;

    let mut parts = rest.splitn(4, FIELD_DELIMITER);
    let entry_type = parts.next()?.parse::<EntryType>().ok()?;
    let component = parts.next()?.trim().to_string();
    let origin = parts.next()?.trim().to_string();
    let context_id = unescape_text(parts.next()?.trim_end());

    Some(HeaderLine {
        timestamp,
        entry_type,
        component,
        origin,
        context_id,
    })
}

// ============================================================================
// Entry body lines
// ============================================================================

pub fn render_event_line(label: &str) -> String {
    format!("{}{} {}\n", SECTION_INDENT, EVENT_PREFIX, escape_text(label))
}

pub fn render_call_site_line(call_site: &str) -> String {
    format!("{}{} {}\n", SECTION_INDENT, CALL_SITE_PREFIX, escape_text(call_site))
}

pub fn render_state_header() -> String {
    format!("{}{}\n", SECTION_INDENT, STATE_HEADER)
}

pub fn render_state_line(key: &str, value: &StateValue) -> String {
    format!("{}{}: {}\n", STATE_INDENT, encode_key(key), encode_value(value))
}

pub fn render_separator() -> String {
    format!("{}\n", SEPARATOR)
}

/// Text after a `PREFIX:` marker, with the single space the writer adds
/// removed and escapes undone
pub fn parse_prefixed(trimmed: &str, prefix: &str) -> Option<String> {
    let rest = trimmed.strip_prefix(prefix)?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    Some(unescape_text(rest))
}

/// Split a state line into key and decoded value
///
/// The key ends at the first `:` that is not escaped.
pub fn parse_state_line(trimmed: &str) -> Option<(String, StateValue)> {
    let end = key_end(trimmed)?;
    let key = trimmed[..end].trim();
    if key.is_empty() {
        return None;
    }
    let value = &trimmed[end + 1..];
    let value = value.strip_prefix(' ').unwrap_or(value);
    Some((decode_key(key), decode_value(value)))
}

fn key_end(s: &str) -> Option<usize> {
    let mut chars = s.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            ':' => return Some(i),
            _ => {}
        }
    }
    None
}

pub fn is_separator(trimmed: &str) -> bool {
    trimmed == SEPARATOR
}

// ============================================================================
// Value codec
// ============================================================================

/// Encode a state value for a `key: value` line
///
/// Text that could be misread as another kind of value is written quoted.
pub fn encode_value(value: &StateValue) -> String {
    match value {
        StateValue::Bool(b) => b.to_string(),
        StateValue::Int(i) => i.to_string(),
        StateValue::UInt(u) => u.to_string(),
        // Debug keeps the fractional part (1.0, not 1)
        StateValue::Float(x) => format!("{:?}", x),
        StateValue::Text(s) => {
            if needs_quotes(s) {
                quote(s)
            } else {
                s.clone()
            }
        }
        StateValue::List(items) => {
            let items: Vec<String> = items.iter().map(|item| escape_list_item(item)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

/// Decode the value half of a `key: value` line
pub fn decode_value(raw: &str) -> StateValue {
    let s = raw.trim_end();

    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return StateValue::Text(unescape_text(&s[1..s.len() - 1]));
    }
    match s {
        "true" => return StateValue::Bool(true),
        "false" => return StateValue::Bool(false),
        _ => {}
    }
    if let Ok(i) = s.parse::<i64>() {
        return StateValue::Int(i);
    }
    if let Ok(u) = s.parse::<u64>() {
        return StateValue::UInt(u);
    }
    if let Ok(x) = s.parse::<f64>() {
        return StateValue::Float(x);
    }
    if s.len() >= 2 && s.starts_with('[') && s.ends_with(']') {
        return StateValue::List(split_list(&s[1..s.len() - 1]));
    }
    StateValue::Text(s.to_string())
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s.trim() != s
        || s == "true"
        || s == "false"
        || s.parse::<i64>().is_ok()
        || s.parse::<u64>().is_ok()
        || s.parse::<f64>().is_ok()
        || s.starts_with('[')
        || s.starts_with('"')
        || s.contains(['\n', '\r'])
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    out.push_str(&escape_text(s).replace('"', "\\\""));
    out.push('"');
    out
}

/// Escape backslashes and line breaks so text stays on one line
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Inverse of [`escape_text`] (also undoes `\"` and `\,`)
pub fn unescape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn escape_list_item(s: &str) -> String {
    escape_text(s).replace(',', "\\,")
}

fn split_list(inner: &str) -> Vec<String> {
    if inner.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            // the writer puts one space after each delimiter
            let item = if i > 0 { item.strip_prefix(' ').unwrap_or(&item).to_string() } else { item };
            unescape_text(&item)
        })
        .collect()
}

/// Encode a state key for a `key: value` line
///
/// `:` is written as `\:` and line breaks are escaped. Keys that are empty,
/// padded or start with a quote are quoted, since the reader strips the
/// line's indentation.
pub fn encode_key(key: &str) -> String {
    let escaped = escape_text(key).replace(':', "\\:");
    if key.is_empty() || key.trim() != key || key.starts_with('"') {
        format!("\"{}\"", escaped.replace('"', "\\\""))
    } else {
        escaped
    }
}

fn decode_key(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        unescape_text(&raw[1..raw.len() - 1])
    } else {
        unescape_text(raw)
    }
}

/// Header fields cannot contain the field delimiter or line breaks
///
/// Applied to the component in both the banner and the entry headers, so
/// the two always agree.
pub fn sanitize_field(field: &str) -> String {
    let field: String = field
        .chars()
        .map(|c| if c == '|' || c == '\n' || c == '\r' { '_' } else { c })
        .collect();
    field.trim().to_string()
}
