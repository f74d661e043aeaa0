//! Synchronization rules: `when` patterns, `where` frame transforms, `then`
//! invocations.
//!
//! A rule is declared by a constructor that receives a fresh [`Vars`] scope:
//!
//! ```rust,ignore
//! fn create_post(v: &mut Vars) -> SyncRule {
//!     let [request, title, body, post_id] = v.vars(["request", "title", "body", "postID"]);
//!     SyncRule::new("CreatePost")
//!         .when(
//!             Pattern::new("Requesting", "request")
//!                 .input("path", "/Post/create")
//!                 .input_var(title)
//!                 .input_var(body)
//!                 .output_var(request),
//!         )
//!         .then(
//!             Invocation::new("Post", "create")
//!                 .arg_var(title)
//!                 .arg_var(body)
//!                 .bind_var(post_id),
//!         )
//! }
//! ```

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::frame::Frame;
use crate::pattern::{Pattern, PatternSummary, Term, Var, Vars};
use crate::value::Record;

/// Pure transform over the candidate frames of one rule.
pub type WhereFn = Arc<dyn Fn(Vec<Frame>) -> Vec<Frame> + Send + Sync>;

/// A rule constructor: declares its variables in the given scope.
pub type SyncDefinition = fn(&mut Vars) -> SyncRule;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// One entry of a `then` list: an operation call built from bound variables.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub(crate) concept: String,
    pub(crate) operation: String,
    pub(crate) args: Vec<(String, Term)>,
    pub(crate) binds: Vec<(String, Var)>,
}

impl Invocation {
    pub fn new(concept: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            operation: operation.into(),
            args: Vec::new(),
            binds: Vec::new(),
        }
    }

    pub fn arg(mut self, field: impl Into<String>, term: impl Into<Term>) -> Self {
        self.args.push((field.into(), term.into()));
        self
    }

    /// Argument named after the variable, e.g. `{ postID }`.
    pub fn arg_var(self, var: Var) -> Self {
        self.arg(var.name(), var)
    }

    /// Bind output `field` of this call into the frame for later invocations.
    pub fn bind(mut self, field: impl Into<String>, var: Var) -> Self {
        self.binds.push((field.into(), var));
        self
    }

    pub fn bind_var(self, var: Var) -> Self {
        self.bind(var.name(), var)
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Substitute `frame` into the argument template.
    ///
    /// Fails with the first unbound variable; nothing partial is produced.
    pub fn arguments(&self, frame: &Frame) -> Result<Record, Var> {
        let mut args = Record::new();
        for (field, term) in &self.args {
            let value = match term {
                Term::Lit(v) => v.clone(),
                Term::Var(var) => frame.get(*var).cloned().ok_or(*var)?,
            };
            args.insert(field.clone(), value);
        }
        Ok(args)
    }
}

// ---------------------------------------------------------------------------
// SyncRule
// ---------------------------------------------------------------------------

/// A named synchronization.
#[derive(Clone)]
pub struct SyncRule {
    pub(crate) name: String,
    pub(crate) when: Vec<Pattern>,
    pub(crate) wheres: Vec<WhereFn>,
    pub(crate) provides: Vec<Var>,
    pub(crate) then: Vec<Invocation>,
}

impl SyncRule {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            when: Vec::new(),
            wheres: Vec::new(),
            provides: Vec::new(),
            then: Vec::new(),
        }
    }

    /// Build a rule from a constructor with its own variable scope.
    pub fn declare(definition: impl FnOnce(&mut Vars) -> SyncRule) -> Self {
        definition(&mut Vars::new())
    }

    pub fn when(mut self, pattern: Pattern) -> Self {
        self.when.push(pattern);
        self
    }

    /// Raw `where` clause over the whole frame list.
    ///
    /// `provides` lists variables the clause binds that `when` does not, so
    /// registration can check `then` templates up front.
    pub fn where_frames(
        mut self,
        provides: impl IntoIterator<Item = Var>,
        f: impl Fn(Vec<Frame>) -> Vec<Frame> + Send + Sync + 'static,
    ) -> Self {
        self.provides.extend(provides);
        self.wheres.push(Arc::new(f));
        self
    }

    /// Keep frames satisfying `pred`.
    pub fn filter(self, pred: impl Fn(&Frame) -> bool + Send + Sync + 'static) -> Self {
        self.where_frames([], move |frames| frames.into_iter().filter(|f| pred(f)).collect())
    }

    /// Keep and reshape frames; `None` drops the frame.
    pub fn filter_map(
        self,
        provides: impl IntoIterator<Item = Var>,
        f: impl Fn(Frame) -> Option<Frame> + Send + Sync + 'static,
    ) -> Self {
        self.where_frames(provides, move |frames| frames.into_iter().filter_map(&f).collect())
    }

    pub fn then(mut self, invocation: Invocation) -> Self {
        self.then.push(invocation);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.when
    }

    pub fn invocations(&self) -> &[Invocation] {
        &self.then
    }

    /// Apply every `where` clause in declaration order.
    pub(crate) fn apply_where(&self, frames: Vec<Frame>) -> Vec<Frame> {
        self.wheres.iter().fold(frames, |frames, f| f(frames))
    }

    /// Variables bound by `when` and `where`, before any `then` output.
    pub(crate) fn bound_before_then(&self) -> BTreeSet<Var> {
        self.when
            .iter()
            .flat_map(Pattern::vars)
            .chain(self.provides.iter().copied())
            .collect()
    }

    pub fn describe(&self) -> SyncSummary {
        SyncSummary {
            name: self.name.clone(),
            when: self.when.iter().map(Pattern::describe).collect(),
            has_where: !self.wheres.is_empty(),
            then: self
                .then
                .iter()
                .map(|i| format!("{}.{}", i.concept, i.operation))
                .collect(),
        }
    }
}

impl fmt::Debug for SyncRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncRule")
            .field("name", &self.name)
            .field("when", &self.when)
            .field("wheres", &self.wheres.len())
            .field("provides", &self.provides)
            .field("then", &self.then)
            .finish()
    }
}

/// Serializable listing of a rule.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub name: String,
    pub when: Vec<PatternSummary>,
    pub has_where: bool,
    pub then: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Vars;
    use serde_json::json;

    #[test]
    fn arguments_substitute_bound_variables_and_literals() {
        let mut v = Vars::new();
        let [request, error] = v.vars(["request", "error"]);
        let inv = Invocation::new("Requesting", "respond")
            .arg_var(request)
            .arg("success", false)
            .arg_var(error);
        let frame = Frame::new().with(request, "r1").with(error, "Session required");
        let args = inv.arguments(&frame).unwrap();
        assert_eq!(
            serde_json::Value::Object(args),
            json!({ "request": "r1", "success": false, "error": "Session required" })
        );
    }

    #[test]
    fn arguments_fail_closed_on_unbound_variable() {
        let mut v = Vars::new();
        let [request, error] = v.vars(["request", "error"]);
        let inv = Invocation::new("Requesting", "respond")
            .arg_var(request)
            .arg_var(error);
        let frame = Frame::new().with(request, "r1");
        assert_eq!(inv.arguments(&frame).unwrap_err(), error);
    }

    #[test]
    fn where_clauses_compose_in_order() {
        let rule = SyncRule::declare(|v| {
            let [n, doubled] = v.vars(["n", "doubled"]);
            SyncRule::new("Compose")
                .when(crate::pattern::Pattern::new("A", "x").input_var(n))
                .filter(move |f| f.get(n).and_then(|x| x.as_i64()).unwrap_or(0) > 1)
                .filter_map([doubled], move |f| {
                    let x = f.get(n)?.as_i64()?;
                    Some(f.with(doubled, x * 2))
                })
        });
        let mut v = Vars::new();
        let [n, doubled] = v.vars(["n", "doubled"]);
        let frames = vec![Frame::new().with(n, 1), Frame::new().with(n, 3)];
        let out = rule.apply_where(frames);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get(doubled), Some(&json!(6)));
        assert!(rule.bound_before_then().contains(&doubled));
    }

    #[test]
    fn describe_lists_patterns_and_targets() {
        let rule = SyncRule::declare(|v| {
            let request = v.var("request");
            SyncRule::new("Echo")
                .when(crate::pattern::Pattern::new("Requesting", "request").output_var(request))
                .then(Invocation::new("Requesting", "respond").arg_var(request))
        });
        let s = rule.describe();
        assert_eq!(s.name, "Echo");
        assert_eq!(s.when[0].outputs, vec!["request".to_string()]);
        assert_eq!(s.then, vec!["Requesting.respond".to_string()]);
        assert!(!s.has_where);
    }
}
