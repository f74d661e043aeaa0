//! Matching `when` clauses against a flow's action log.
//!
//! The join runs left to right: start from one empty frame, and for each
//! pattern extend every surviving frame with every record of the pattern's
//! concept operation that unifies with it. Records are visited in sequence
//! order, so the frame list is deterministic for a given log.

use crate::action::{ActionLog, ActionRecord, Outcome};
use crate::frame::Frame;
use crate::pattern::{Pattern, Term};
use crate::value::{Record, Value};

/// All frames satisfying `patterns` against `log`.
///
/// One frame per satisfying combination of records, one record per pattern.
/// An empty pattern list yields the single empty frame.
pub fn match_when(patterns: &[Pattern], log: &ActionLog) -> Vec<Frame> {
    let mut frames = vec![Frame::new()];
    for pattern in patterns {
        let mut next = Vec::new();
        for frame in &frames {
            for record in log.of(&pattern.concept, &pattern.operation) {
                if let Some(extended) = extend(frame, pattern, record) {
                    next.push(extended);
                }
            }
        }
        if next.is_empty() {
            return next;
        }
        frames = next;
    }
    frames
}

/// Try to extend `frame` so that `pattern` matches `record`.
///
/// Returns `None` on any unification failure; `frame` itself is untouched.
pub fn extend(frame: &Frame, pattern: &Pattern, record: &ActionRecord) -> Option<Frame> {
    if !record.is(&pattern.concept, &pattern.operation) {
        return None;
    }

    let mut candidate = frame.clone();

    match (&record.outcome, &pattern.error) {
        (Outcome::Err { error }, Some(term)) => {
            if !unify_term(&mut candidate, term, &Value::String(error.clone())) {
                return None;
            }
        }
        (Outcome::Ok { .. }, Some(_)) => return None,
        (Outcome::Err { .. }, None) if !pattern.outputs.is_empty() => return None,
        _ => {}
    }

    if !unify_fields(&mut candidate, &pattern.inputs, &record.inputs) {
        return None;
    }
    if let Some(outputs) = record.outcome.outputs() {
        if !unify_fields(&mut candidate, &pattern.outputs, outputs) {
            return None;
        }
    }

    candidate.push_provenance(record.sequence);
    Some(candidate)
}

/// Absent record fields read as `null`, so optional request fields still bind.
fn unify_fields(frame: &mut Frame, fields: &[(String, Term)], values: &Record) -> bool {
    fields.iter().all(|(field, term)| {
        let value = values.get(field).unwrap_or(&Value::Null);
        unify_term(frame, term, value)
    })
}

fn unify_term(frame: &mut Frame, term: &Term, value: &Value) -> bool {
    match term {
        Term::Lit(expected) => expected == value,
        Term::Var(var) => frame.unify(*var, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Vars;
    use crate::value::record;
    use serde_json::json;
    use uuid::Uuid;

    fn push(log: &mut ActionLog, concept: &str, op: &str, inputs: Value, outcome: Outcome) {
        let seq = log.len() as u64 + 1;
        log.append(ActionRecord {
            sequence: seq,
            flow: Uuid::nil(),
            concept: concept.into(),
            operation: op.into(),
            inputs: record(inputs),
            outcome,
        });
    }

    fn ok(v: Value) -> Outcome {
        Outcome::Ok { outputs: record(v) }
    }

    #[test]
    fn literal_and_variable_fields_unify() {
        let mut log = ActionLog::new();
        push(
            &mut log,
            "Requesting",
            "request",
            json!({ "path": "/Post/create", "title": "Hi" }),
            ok(json!({ "request": "r1" })),
        );
        let mut v = Vars::new();
        let [request, title] = v.vars(["request", "title"]);
        let when = vec![Pattern::new("Requesting", "request")
            .input("path", "/Post/create")
            .input_var(title)
            .output_var(request)];

        let frames = match_when(&when, &log);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].str(title), Some("Hi"));
        assert_eq!(frames[0].str(request), Some("r1"));
        assert_eq!(frames[0].provenance(), &[1]);
    }

    #[test]
    fn literal_mismatch_prunes() {
        let mut log = ActionLog::new();
        push(&mut log, "Requesting", "request", json!({ "path": "/other" }), ok(json!({})));
        let when = vec![Pattern::new("Requesting", "request").input("path", "/Post/create")];
        assert!(match_when(&when, &log).is_empty());
    }

    #[test]
    fn shared_variable_joins_across_patterns() {
        let mut log = ActionLog::new();
        push(&mut log, "Session", "getSessionUser", json!({ "session": "s1" }), ok(json!({ "userID": "u1" })));
        push(&mut log, "Session", "getSessionUser", json!({ "session": "s2" }), ok(json!({ "userID": "u2" })));
        push(&mut log, "UserAccount", "getUser", json!({ "userID": "u2" }), ok(json!({ "user": { "name": "b" } })));

        let mut v = Vars::new();
        let [user_id, session, user] = v.vars(["userID", "session", "user"]);
        let when = vec![
            Pattern::new("Session", "getSessionUser")
                .input_var(session)
                .output_var(user_id),
            Pattern::new("UserAccount", "getUser")
                .input_var(user_id)
                .output_var(user),
        ];
        let frames = match_when(&when, &log);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].str(session), Some("s2"));
        assert_eq!(frames[0].provenance(), &[2, 3]);
    }

    #[test]
    fn cartesian_product_of_independent_patterns() {
        let mut log = ActionLog::new();
        push(&mut log, "A", "x", json!({ "n": 1 }), ok(json!({})));
        push(&mut log, "A", "x", json!({ "n": 2 }), ok(json!({})));
        push(&mut log, "B", "y", json!({ "m": 1 }), ok(json!({})));
        push(&mut log, "B", "y", json!({ "m": 2 }), ok(json!({})));

        let mut v = Vars::new();
        let [n, m] = v.vars(["n", "m"]);
        let when = vec![
            Pattern::new("A", "x").input_var(n),
            Pattern::new("B", "y").input_var(m),
        ];
        let frames = match_when(&when, &log);
        let pairs: Vec<(i64, i64)> = frames
            .iter()
            .map(|f| (f.get(n).unwrap().as_i64().unwrap(), f.get(m).unwrap().as_i64().unwrap()))
            .collect();
        assert_eq!(pairs, vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn error_pattern_matches_only_failures() {
        let mut log = ActionLog::new();
        push(&mut log, "Session", "getSessionUser", json!({ "session": "bad" }), Outcome::Err { error: "Session required".into() });
        push(&mut log, "Session", "getSessionUser", json!({ "session": "good" }), ok(json!({ "userID": "u1" })));

        let mut v = Vars::new();
        let [error, user_id] = v.vars(["error", "userID"]);
        let failing = vec![Pattern::new("Session", "getSessionUser").error(error)];
        let frames = match_when(&failing, &log);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].str(error), Some("Session required"));

        let succeeding = vec![Pattern::new("Session", "getSessionUser").output_var(user_id)];
        let frames = match_when(&succeeding, &log);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].provenance(), &[2]);

        let either = vec![Pattern::new("Session", "getSessionUser")];
        assert_eq!(match_when(&either, &log).len(), 2);
    }

    #[test]
    fn missing_fields_read_as_null() {
        let mut log = ActionLog::new();
        push(&mut log, "Requesting", "request", json!({ "path": "/p" }), ok(json!({})));
        let mut v = Vars::new();
        let image = v.var("imageURL");
        let when = vec![Pattern::new("Requesting", "request").input_var(image)];
        let frames = match_when(&when, &log);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].get(image), Some(&Value::Null));
    }

    #[test]
    fn empty_when_yields_one_empty_frame() {
        let log = ActionLog::new();
        let frames = match_when(&[], &log);
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_empty());
    }
}
