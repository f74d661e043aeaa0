//! Action records and the append-only log of a flow.
//!
//! An `ActionRecord` is the immutable fact that one concept operation
//! completed: what was called, with which inputs, and what came back. The
//! engine appends one record per invocation and matches synchronizations
//! against the log of the flow the invocation belongs to.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::value::{Record, Value};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one invocation: an output record or an error marker, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Ok { outputs: Record },
    Err { error: String },
}

impl Outcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn outputs(&self) -> Option<&Record> {
        match self {
            Self::Ok { outputs } => Some(outputs),
            Self::Err { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Ok { .. } => None,
            Self::Err { error } => Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// ActionRecord
// ---------------------------------------------------------------------------

/// Immutable record of one completed operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Process-wide position; strictly increasing in append order.
    pub sequence: u64,
    /// The flow (logical request) this record belongs to.
    pub flow: Uuid,
    pub concept: String,
    pub operation: String,
    pub inputs: Record,
    pub outcome: Outcome,
}

impl ActionRecord {
    pub fn is(&self, concept: &str, operation: &str) -> bool {
        self.concept == concept && self.operation == operation
    }

    /// Convenience lookup of a single output field.
    pub fn output(&self, field: &str) -> Option<&Value> {
        self.outcome.outputs().and_then(|o| o.get(field))
    }

    pub fn input(&self, field: &str) -> Option<&Value> {
        self.inputs.get(field)
    }
}

// ---------------------------------------------------------------------------
// ActionLog
// ---------------------------------------------------------------------------

/// Append-only, sequence-ordered log of one flow.
///
/// Records are shared behind `Arc` so frames and summaries can hold them
/// without copying; nothing hands out mutable access once appended.
#[derive(Debug, Default, Clone)]
pub struct ActionLog {
    records: Vec<Arc<ActionRecord>>,
}

impl ActionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Sequences must arrive in increasing order.
    pub(crate) fn append(&mut self, record: ActionRecord) -> Arc<ActionRecord> {
        debug_assert!(
            self.records
                .last()
                .map_or(true, |last| last.sequence < record.sequence),
            "action log sequences must increase"
        );
        let record = Arc::new(record);
        self.records.push(record.clone());
        record
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ActionRecord>> {
        self.records.iter()
    }

    /// Records of one concept operation, in sequence order.
    pub fn of<'a>(
        &'a self,
        concept: &'a str,
        operation: &'a str,
    ) -> impl Iterator<Item = &'a Arc<ActionRecord>> + 'a {
        self.records
            .iter()
            .filter(move |r| r.is(concept, operation))
    }

    pub fn last(&self) -> Option<&Arc<ActionRecord>> {
        self.records.last()
    }

    pub fn into_records(self) -> Vec<ActionRecord> {
        self.records
            .into_iter()
            .map(|r| Arc::try_unwrap(r).unwrap_or_else(|shared| (*shared).clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record;
    use serde_json::json;

    fn rec(seq: u64, concept: &str, op: &str, outcome: Outcome) -> ActionRecord {
        ActionRecord {
            sequence: seq,
            flow: Uuid::nil(),
            concept: concept.into(),
            operation: op.into(),
            inputs: Record::new(),
            outcome,
        }
    }

    #[test]
    fn outcome_accessors() {
        let ok = Outcome::Ok {
            outputs: record(json!({ "postID": "p1" })),
        };
        let err = Outcome::Err {
            error: "Session required".into(),
        };
        assert!(ok.is_ok());
        assert_eq!(ok.outputs().unwrap()["postID"], "p1");
        assert_eq!(ok.error(), None);
        assert!(!err.is_ok());
        assert_eq!(err.error(), Some("Session required"));
        assert!(err.outputs().is_none());
    }

    #[test]
    fn outcome_serializes_with_type_tag() {
        let err = Outcome::Err {
            error: "boom".into(),
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v, json!({ "type": "err", "error": "boom" }));
    }

    #[test]
    fn log_filters_by_concept_and_operation() {
        let mut log = ActionLog::new();
        log.append(rec(1, "Post", "create", Outcome::Ok { outputs: Record::new() }));
        log.append(rec(2, "Post", "get", Outcome::Ok { outputs: Record::new() }));
        log.append(rec(3, "Post", "create", Outcome::Err { error: "x".into() }));

        let seqs: Vec<u64> = log.of("Post", "create").map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().sequence, 3);
    }

    #[test]
    fn into_records_preserves_order() {
        let mut log = ActionLog::new();
        log.append(rec(4, "A", "x", Outcome::Ok { outputs: Record::new() }));
        log.append(rec(9, "B", "y", Outcome::Ok { outputs: Record::new() }));
        let records = log.into_records();
        assert_eq!(records[0].sequence, 4);
        assert_eq!(records[1].concept, "B");
    }
}
