//! Content-addressed task identity.
//!
//! A task is identified by the SHA-256 digest of its input document in a
//! canonical JSON form: object keys sorted at every depth, no
//! insignificant whitespace. Two submissions with the same logical input
//! therefore collapse onto the same `job_descriptor` regardless of key
//! order on the wire.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute the `job_descriptor` for a task input document.
///
/// Returns the lowercase hex SHA-256 digest (64 chars) of the canonical
/// JSON serialization of `task_input`.
pub fn fingerprint(task_input: &Value) -> String {
    let mut canonical = String::new();
    write_canonical(task_input, &mut canonical);
    hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Serialize a JSON value canonically: sorted object keys, compact
/// separators, `serde_json`-compatible string escaping and number forms.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        // Number's Display preserves the input's numeric type: integers
        // stay integers, floats keep a fractional part.
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                if let Some(item) = map.get(key) {
                    write_canonical(item, out);
                }
            }
            out.push('}');
        }
    }
}

/// Write a JSON string literal with the same escapes `serde_json` emits:
/// the two mandatory characters, the short forms for common controls,
/// and `\u00XX` for the rest of the control range.
fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
