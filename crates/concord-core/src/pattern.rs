//! Variables, terms and `when` patterns.

use serde::Serialize;
use std::fmt;

use crate::value::Value;

// ---------------------------------------------------------------------------
// Var / Vars
// ---------------------------------------------------------------------------

/// A rule-local variable.
///
/// Identity is the slot the variable occupies in the [`Vars`] scope that
/// created it; the name is only for diagnostics and field shorthands. Two
/// synchronizations that both declare `userID` get unrelated variables.
#[derive(Clone, Copy)]
pub struct Var {
    slot: u16,
    name: &'static str,
}

impl Var {
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Var {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl Eq for Var {}

impl PartialOrd for Var {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Var {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.slot.cmp(&other.slot)
    }
}

impl std::hash::Hash for Var {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Variable scope of one synchronization declaration.
///
/// Asking for the same name twice returns the same variable.
#[derive(Debug, Default)]
pub struct Vars {
    names: Vec<&'static str>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn var(&mut self, name: &'static str) -> Var {
        if let Some(slot) = self.names.iter().position(|n| *n == name) {
            return Var {
                slot: slot as u16,
                name,
            };
        }
        self.names.push(name);
        Var {
            slot: (self.names.len() - 1) as u16,
            name,
        }
    }

    /// Declare several variables at once.
    ///
    /// ```rust,ignore
    /// let [request, session, user_id] = v.vars(["request", "session", "userID"]);
    /// ```
    pub fn vars<const N: usize>(&mut self, names: [&'static str; N]) -> [Var; N] {
        names.map(|n| self.var(n))
    }
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// One field of a pattern or argument template: a variable or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(Var),
    Lit(Value),
}

impl Term {
    pub fn as_var(&self) -> Option<Var> {
        match self {
            Self::Var(v) => Some(*v),
            Self::Lit(_) => None,
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Self::Var(v)
    }
}

impl From<Value> for Term {
    fn from(v: Value) -> Self {
        Self::Lit(v)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Self::Lit(Value::String(s.to_string()))
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Self::Lit(Value::String(s))
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Self::Lit(Value::Bool(b))
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Self::Lit(Value::from(n))
    }
}

// ---------------------------------------------------------------------------
// Pattern
// ---------------------------------------------------------------------------

/// One clause of a `when` list.
///
/// Fields left out match anything. A pattern with output fields matches only
/// successful records; one with an error term matches only failed records;
/// one with neither matches both.
#[derive(Debug, Clone)]
pub struct Pattern {
    pub(crate) concept: String,
    pub(crate) operation: String,
    pub(crate) inputs: Vec<(String, Term)>,
    pub(crate) outputs: Vec<(String, Term)>,
    pub(crate) error: Option<Term>,
}

impl Pattern {
    pub fn new(concept: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            operation: operation.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            error: None,
        }
    }

    pub fn input(mut self, field: impl Into<String>, term: impl Into<Term>) -> Self {
        self.inputs.push((field.into(), term.into()));
        self
    }

    /// Input field named after the variable, e.g. `{ session }`.
    pub fn input_var(self, var: Var) -> Self {
        self.input(var.name(), var)
    }

    pub fn output(mut self, field: impl Into<String>, term: impl Into<Term>) -> Self {
        self.outputs.push((field.into(), term.into()));
        self
    }

    pub fn output_var(self, var: Var) -> Self {
        self.output(var.name(), var)
    }

    /// Match failed records only, unifying `term` with the error message.
    pub fn error(mut self, term: impl Into<Term>) -> Self {
        self.error = Some(term.into());
        self
    }

    pub fn concept(&self) -> &str {
        &self.concept
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Every variable mentioned by the pattern.
    pub fn vars(&self) -> impl Iterator<Item = Var> + '_ {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|(_, t)| t)
            .chain(self.error.iter())
            .filter_map(Term::as_var)
    }

    pub fn describe(&self) -> PatternSummary {
        PatternSummary {
            concept: self.concept.clone(),
            operation: self.operation.clone(),
            inputs: self.inputs.iter().map(|(f, _)| f.clone()).collect(),
            outputs: self.outputs.iter().map(|(f, _)| f.clone()).collect(),
            matches_error: self.error.is_some(),
        }
    }
}

/// Serializable shape of a pattern for listings.
#[derive(Debug, Clone, Serialize)]
pub struct PatternSummary {
    pub concept: String,
    pub operation: String,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub matches_error: bool,
}
