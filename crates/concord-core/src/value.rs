//! The value domain shared by concepts and the engine.
//!
//! Everything crossing the concept boundary is plain JSON: strings, numbers,
//! booleans, null, lists and records. Identifiers travel as strings.

pub use serde_json::Value;

/// A record of named values: the argument and result shape of every operation.
pub type Record = serde_json::Map<String, Value>;

/// Build a [`Record`] from a `json!` object literal.
///
/// Non-object values produce an empty record.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}

/// Stable textual form of a value, used to compare bindings across passes.
///
/// `serde_json::Map` keeps keys sorted, so equal values always render equally.
pub fn canonical(value: &Value) -> String {
    value.to_string()
}

/// Top-level fields whose values never reach log lines.
const REDACTED_FIELDS: &[&str] = &["password", "credential_data", "token", "session"];

/// Short human-readable rendering for log lines, with secrets masked.
pub(crate) fn summarize(record: &Record) -> String {
    let mut shown = record.clone();
    for field in REDACTED_FIELDS {
        if let Some(v) = shown.get_mut(*field) {
            if !v.is_null() {
                *v = Value::String("[REDACTED]".into());
            }
        }
    }
    let rendered = Value::Object(shown).to_string();
    if rendered.len() > 240 {
        let cut = rendered
            .char_indices()
            .map(|(i, _)| i)
            .take_while(|i| *i <= 240)
            .last()
            .unwrap_or(0);
        format!("{}…", &rendered[..cut])
    } else {
        rendered
    }
}
