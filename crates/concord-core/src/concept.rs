//! Concept registration and the invocation adapter.
//!
//! Concepts are registered once at startup into a [`ConceptRegistry`]: a
//! static table of concept name → operation name → handler. Every
//! synchronization is checked against this table before the engine starts,
//! so a misspelled concept, operation or field is a startup error rather than
//! a silently dead rule.

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use crate::error::{ConceptError, ConcordError, Result};
use crate::sync::SyncRule;
use crate::value::{Record, Value};

pub type OperationResult = std::result::Result<Record, ConceptError>;

/// Type-erased async operation body.
pub type Handler = Arc<dyn Fn(Record) -> BoxFuture<'static, OperationResult> + Send + Sync>;

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One named operation of a concept.
#[derive(Clone)]
pub struct Operation {
    name: String,
    accepts: Option<BTreeSet<String>>,
    returns: Option<BTreeSet<String>>,
    handler: Handler,
}

impl Operation {
    /// Operation over raw records.
    pub fn raw<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = OperationResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            accepts: None,
            returns: None,
            handler: Arc::new(move |input| f(input).boxed()),
        }
    }

    /// Operation with a typed argument record and a typed result record.
    ///
    /// Arguments that fail to deserialize become
    /// [`ConceptError::InvalidArguments`]; results must serialize to a record.
    pub fn typed<A, O, F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, ConceptError>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::raw(name, move |input: Record| call_typed(f.clone(), input))
    }

    /// Typed operation whose handler receives a shared concept instance.
    ///
    /// ```rust,ignore
    /// Operation::bound("getPost", &self, |posts, a: GetPost| async move { posts.get_post(a).await })
    /// ```
    pub fn bound<S, A, O, F, Fut>(name: impl Into<String>, target: &Arc<S>, f: F) -> Self
    where
        S: Send + Sync + 'static,
        A: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<O, ConceptError>> + Send + 'static,
    {
        let target = target.clone();
        Self::typed(name, move |args: A| f(target.clone(), args))
    }

    /// Declare the input fields this operation understands.
    pub fn accepts<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.accepts = Some(fields.into_iter().map(str::to_string).collect());
        self
    }

    /// Declare the output fields this operation produces.
    pub fn returns<'a>(mut self, fields: impl IntoIterator<Item = &'a str>) -> Self {
        self.returns = Some(fields.into_iter().map(str::to_string).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts_field(&self, field: &str) -> bool {
        self.accepts.as_ref().map_or(true, |a| a.contains(field))
    }

    pub fn returns_field(&self, field: &str) -> bool {
        self.returns.as_ref().map_or(true, |r| r.contains(field))
    }

    pub fn call(&self, input: Record) -> BoxFuture<'static, OperationResult> {
        (self.handler)(input)
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("accepts", &self.accepts)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

async fn call_typed<A, O, F, Fut>(f: Arc<F>, input: Record) -> OperationResult
where
    A: DeserializeOwned,
    O: Serialize,
    F: Fn(A) -> Fut,
    Fut: Future<Output = std::result::Result<O, ConceptError>>,
{
    let args: A = serde_json::from_value(Value::Object(input))
        .map_err(|e| ConceptError::InvalidArguments(e.to_string()))?;
    let out = f(args).await?;
    match serde_json::to_value(out) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(other) => Err(ConceptError::InvalidOutput(other.to_string())),
        Err(e) => Err(ConceptError::InvalidOutput(e.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Concept
// ---------------------------------------------------------------------------

/// A self-contained unit of functionality exposing named operations.
///
/// Implementations know nothing of each other or of the engine.
pub trait Concept: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// The operation table. Handlers typically capture a clone of `self`.
    fn operations(self: Arc<Self>) -> Vec<Operation>;
}

// ---------------------------------------------------------------------------
// ConceptRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct ConceptRegistry {
    concepts: BTreeMap<String, BTreeMap<String, Operation>>,
}

impl ConceptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: Concept>(&mut self, concept: Arc<C>) -> Result<()> {
        let name = concept.name();
        self.register_operations(name, concept.operations())
    }

    pub fn register_operations(
        &mut self,
        concept: impl Into<String>,
        operations: Vec<Operation>,
    ) -> Result<()> {
        let concept = concept.into();
        if self.concepts.contains_key(&concept) {
            return Err(ConcordError::DuplicateConcept(concept));
        }
        let mut table = BTreeMap::new();
        for op in operations {
            if table.contains_key(op.name()) {
                return Err(ConcordError::DuplicateOperation {
                    concept,
                    operation: op.name().to_string(),
                });
            }
            table.insert(op.name().to_string(), op);
        }
        tracing::debug!(concept = %concept, operations = table.len(), "registered concept");
        self.concepts.insert(concept, table);
        Ok(())
    }

    pub fn contains(&self, concept: &str) -> bool {
        self.concepts.contains_key(concept)
    }

    pub fn lookup(&self, concept: &str, operation: &str) -> Result<&Operation> {
        let table = self
            .concepts
            .get(concept)
            .ok_or_else(|| ConcordError::ConceptNotFound(concept.to_string()))?;
        table
            .get(operation)
            .ok_or_else(|| ConcordError::OperationNotFound {
                concept: concept.to_string(),
                operation: operation.to_string(),
            })
    }

    /// Every registered `(concept, operation)` pair, sorted.
    pub fn paths(&self) -> Vec<(String, String)> {
        self.concepts
            .iter()
            .flat_map(|(c, ops)| ops.keys().map(move |o| (c.clone(), o.clone())))
            .collect()
    }

    /// Check a rule against the table: concepts, operations, declared fields,
    /// and that every `then` variable is bound before it is used.
    pub fn validate(&self, rule: &SyncRule) -> Result<()> {
        if rule.when.is_empty() {
            return Err(ConcordError::EmptyWhen(rule.name.clone()));
        }

        for pattern in &rule.when {
            let op = self.resolve(rule, &pattern.concept, &pattern.operation)?;
            for (field, _) in &pattern.inputs {
                if !op.accepts_field(field) {
                    return Err(unknown_field(rule, &pattern.concept, op, "input", field));
                }
            }
            for (field, _) in &pattern.outputs {
                if !op.returns_field(field) {
                    return Err(unknown_field(rule, &pattern.concept, op, "output", field));
                }
            }
        }

        let mut bound = rule.bound_before_then();
        for inv in &rule.then {
            let op = self.resolve(rule, &inv.concept, &inv.operation)?;
            for (field, term) in &inv.args {
                if !op.accepts_field(field) {
                    return Err(unknown_field(rule, &inv.concept, op, "input", field));
                }
                if let Some(var) = term.as_var() {
                    if !bound.contains(&var) {
                        return Err(ConcordError::UnboundVariable {
                            sync: rule.name.clone(),
                            variable: var.name().to_string(),
                            concept: inv.concept.clone(),
                            operation: inv.operation.clone(),
                        });
                    }
                }
            }
            for (field, var) in &inv.binds {
                if !op.returns_field(field) {
                    return Err(unknown_field(rule, &inv.concept, op, "output", field));
                }
                bound.insert(*var);
            }
        }
        Ok(())
    }

    fn resolve(&self, rule: &SyncRule, concept: &str, operation: &str) -> Result<&Operation> {
        self.lookup(concept, operation).map_err(|e| match e {
            ConcordError::ConceptNotFound(c) => ConcordError::UnknownConcept {
                sync: rule.name.clone(),
                concept: c,
            },
            ConcordError::OperationNotFound { concept, operation } => {
                ConcordError::UnknownOperation {
                    sync: rule.name.clone(),
                    concept,
                    operation,
                }
            }
            other => other,
        })
    }
}

fn unknown_field(
    rule: &SyncRule,
    concept: &str,
    op: &Operation,
    direction: &'static str,
    field: &str,
) -> ConcordError {
    ConcordError::UnknownField {
        sync: rule.name.clone(),
        concept: concept.to_string(),
        operation: op.name().to_string(),
        direction,
        field: field.to_string(),
    }
}
