//! Binding frames: one consistent assignment of rule variables to values.

use std::collections::BTreeMap;

use crate::pattern::Var;
use crate::value::{canonical, Record, Value};

/// Variable bindings accumulated while matching one synchronization.
///
/// A frame also remembers which action records (by sequence) produced it.
/// That provenance is fixed by the matcher; `where` clauses can add or
/// reshape bindings but cannot change which records a frame stands for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    bindings: BTreeMap<Var, Value>,
    provenance: Vec<u64>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, var: Var) -> Option<&Value> {
        self.bindings.get(&var)
    }

    /// The binding as a string, if bound to one.
    pub fn str(&self, var: Var) -> Option<&str> {
        self.get(var).and_then(Value::as_str)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.bindings.contains_key(&var)
    }

    /// `true` if `var` is bound to JSON `true`.
    pub fn is_true(&self, var: Var) -> bool {
        matches!(self.get(var), Some(Value::Bool(true)))
    }

    /// A copy of this frame with `var` set to `value`.
    ///
    /// This is how `where` clauses enrich frames: derived flags, error
    /// messages, or a response-safe rendering of a bound record.
    pub fn with(mut self, var: Var, value: impl Into<Value>) -> Self {
        self.bindings.insert(var, value.into());
        self
    }

    /// Unify `var` with `value`: bind if free, otherwise require equality.
    pub(crate) fn unify(&mut self, var: Var, value: &Value) -> bool {
        match self.bindings.get(&var) {
            Some(existing) => existing == value,
            None => {
                self.bindings.insert(var, value.clone());
                true
            }
        }
    }

    pub(crate) fn push_provenance(&mut self, sequence: u64) {
        self.provenance.push(sequence);
    }

    /// Sequences of the records matched by each `when` pattern, in order.
    pub fn provenance(&self) -> &[u64] {
        &self.provenance
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn bindings(&self) -> impl Iterator<Item = (Var, &Value)> {
        self.bindings.iter().map(|(k, v)| (*k, v))
    }

    /// Canonical rendering of the bindings, stable across passes.
    pub(crate) fn fingerprint(&self) -> String {
        let mut out = String::new();
        for (var, value) in &self.bindings {
            out.push_str(var.name());
            out.push('=');
            out.push_str(&canonical(value));
            out.push(';');
        }
        out
    }

    /// Bindings keyed by variable name, for logs and diagnostics.
    pub fn to_record(&self) -> Record {
        self.bindings
            .iter()
            .map(|(k, v)| (k.name().to_string(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Vars;
    use serde_json::json;

    #[test]
    fn unify_binds_then_requires_equality() {
        let mut v = Vars::new();
        let user = v.var("userID");
        let mut f = Frame::new();
        assert!(f.unify(user, &json!("u1")));
        assert!(f.unify(user, &json!("u1")));
        assert!(!f.unify(user, &json!("u2")));
        assert_eq!(f.str(user), Some("u1"));
    }

    #[test]
    fn with_adds_and_replaces_bindings() {
        let mut v = Vars::new();
        let [post, error] = v.vars(["post", "error"]);
        let f = Frame::new().with(post, json!({ "_raw": 1 }));
        let f = f.with(post, json!({ "title": "Hi" })).with(error, "nope");
        assert_eq!(f.get(post), Some(&json!({ "title": "Hi" })));
        assert_eq!(f.str(error), Some("nope"));
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn fingerprint_depends_only_on_bindings() {
        let mut v = Vars::new();
        let [a, b] = v.vars(["a", "b"]);
        let mut f1 = Frame::new().with(b, 2).with(a, 1);
        f1.push_provenance(7);
        let f2 = Frame::new().with(a, 1).with(b, 2);
        assert_eq!(f1.fingerprint(), f2.fingerprint());
        assert_ne!(f1.fingerprint(), f2.clone().with(b, 3).fingerprint());
    }

    #[test]
    fn to_record_uses_variable_names() {
        let mut v = Vars::new();
        let ok = v.var("success");
        let f = Frame::new().with(ok, true);
        assert!(f.is_true(ok));
        assert_eq!(f.to_record().get("success"), Some(&json!(true)));
    }
}
