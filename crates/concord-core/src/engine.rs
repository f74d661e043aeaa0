//! The synchronization engine.
//!
//! An [`Engine`] owns the concept registry and the immutable rule table. Each
//! bootstrap action starts a [`Flow`]: a private, append-only action log plus
//! the set of rule firings already dispatched for it. Settling a flow runs
//! every rule against the log, in registration order, until a full pass
//! appends nothing.
//!
//! ```rust,ignore
//! let engine = Engine::builder(registry)
//!     .sync(posts::create_post_request)
//!     .sync(posts::create_post_respond)
//!     .build()?;
//! let summary = engine
//!     .invoke("Requesting", "request", record(json!({ "path": "/DesignPost/createPost" })))
//!     .await?;
//! ```

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use crate::action::{ActionLog, ActionRecord, Outcome};
use crate::concept::ConceptRegistry;
use crate::config::{EngineConfig, EngineLogging};
use crate::error::{ConcordError, Result};
use crate::frame::Frame;
use crate::matcher::match_when;
use crate::pattern::Var;
use crate::sync::{SyncDefinition, SyncRule, SyncSummary};
use crate::value::{summarize, Record, Value};

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Next process-wide sequence number. Starts at 1.
fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1
}

// ---------------------------------------------------------------------------
// EngineBuilder
// ---------------------------------------------------------------------------

/// Collects rules and validates them against the registry.
pub struct EngineBuilder {
    registry: ConceptRegistry,
    rules: Vec<SyncRule>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn logging(mut self, logging: EngineLogging) -> Self {
        self.config.logging = logging;
        self
    }

    /// Register a rule constructor; it gets a fresh variable scope.
    pub fn sync(mut self, definition: SyncDefinition) -> Self {
        self.rules.push(SyncRule::declare(definition));
        self
    }

    pub fn syncs(self, definitions: impl IntoIterator<Item = SyncDefinition>) -> Self {
        definitions.into_iter().fold(self, Self::sync)
    }

    /// Register an already declared rule.
    pub fn rule(mut self, rule: SyncRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(self, rules: impl IntoIterator<Item = SyncRule>) -> Self {
        rules.into_iter().fold(self, Self::rule)
    }

    /// Validate every rule and freeze the table.
    pub fn build(self) -> Result<Engine> {
        let mut names = HashSet::new();
        for rule in &self.rules {
            if !names.insert(rule.name.clone()) {
                return Err(ConcordError::DuplicateRule(rule.name.clone()));
            }
            self.registry.validate(rule)?;
        }
        let required: Vec<BTreeSet<Var>> = self
            .rules
            .iter()
            .map(|r| r.provides.iter().copied().collect())
            .collect();
        tracing::debug!(rules = self.rules.len(), "synchronizations registered");
        Ok(Engine {
            inner: Arc::new(Inner {
                registry: self.registry,
                rules: self.rules,
                required,
                config: self.config,
            }),
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

struct Inner {
    registry: ConceptRegistry,
    rules: Vec<SyncRule>,
    /// Per rule: variables `where` promised to bind.
    required: Vec<BTreeSet<Var>>,
    config: EngineConfig,
}

/// Shared handle to the registry and rule table. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn builder(registry: ConceptRegistry) -> EngineBuilder {
        EngineBuilder {
            registry,
            rules: Vec::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn registry(&self) -> &ConceptRegistry {
        &self.inner.registry
    }

    pub fn rules(&self) -> &[SyncRule] {
        &self.inner.rules
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn describe(&self) -> Vec<SyncSummary> {
        self.inner.rules.iter().map(SyncRule::describe).collect()
    }

    /// Start a flow by invoking its bootstrap action.
    ///
    /// The bootstrap record is appended before this returns, so its outputs
    /// (such as a minted request id) are available via [`Flow::root`] before
    /// the cascade runs. Fails only if the operation is not registered; an
    /// operation failure is recorded like any other.
    pub async fn begin(
        &self,
        concept: &str,
        operation: &str,
        inputs: Record,
    ) -> Result<Flow> {
        let id = Uuid::new_v4();
        let mut flow = Flow {
            engine: self.clone(),
            id,
            log: ActionLog::new(),
            fired_provenance: HashSet::new(),
            fired_bindings: HashSet::new(),
            consumed: HashSet::new(),
            firings: 0,
        };
        let span = tracing::info_span!("flow", id = %id);
        flow.perform(concept, operation, inputs)
            .instrument(span)
            .await?;
        Ok(flow)
    }

    /// Begin a flow and drive it to its fixpoint.
    pub async fn invoke(
        &self,
        concept: &str,
        operation: &str,
        inputs: Record,
    ) -> Result<FlowSummary> {
        self.begin(concept, operation, inputs).await?.settle().await
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("rules", &self.inner.rules.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// The in-progress cascade descending from one bootstrap action.
///
/// A flow is owned by the single task driving it; nothing else appends to
/// its log.
pub struct Flow {
    engine: Engine,
    id: Uuid,
    log: ActionLog,
    fired_provenance: HashSet<(usize, Vec<u64>)>,
    fired_bindings: HashSet<(usize, String)>,
    /// Sequences some dispatched frame was built from.
    consumed: HashSet<u64>,
    firings: usize,
}

impl Flow {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn log(&self) -> &ActionLog {
        &self.log
    }

    /// The bootstrap record.
    pub fn root(&self) -> Option<&ActionRecord> {
        self.log.iter().next().map(|r| r.as_ref())
    }

    /// Run rules until a full pass appends nothing.
    pub async fn settle(self) -> Result<FlowSummary> {
        let span = tracing::info_span!("flow", id = %self.id);
        self.run().instrument(span).await
    }

    async fn run(mut self) -> Result<FlowSummary> {
        let engine = self.engine.clone();
        let max_passes = engine.inner.config.max_passes;
        let mut passes = 0;

        loop {
            passes += 1;
            if max_passes.is_some_and(|max| passes > max) {
                tracing::error!(passes = passes - 1, "flow did not settle");
                return Err(ConcordError::NoFixpoint {
                    flow: self.id,
                    passes: passes - 1,
                });
            }

            let before = self.log.len();
            for (index, rule) in engine.inner.rules.iter().enumerate() {
                let frames = match_when(&rule.when, &self.log);
                if frames.is_empty() {
                    continue;
                }
                for frame in rule.apply_where(frames) {
                    if !self.claim(index, &frame) {
                        continue;
                    }
                    self.fire(index, rule, frame).await?;
                }
            }

            if self.log.len() == before {
                break;
            }
        }

        self.report_unconsumed_failures();
        tracing::debug!(
            passes,
            records = self.log.len(),
            firings = self.firings,
            "flow settled"
        );

        let mut records = self.log.into_records();
        let root = if records.is_empty() {
            None
        } else {
            Some(records.remove(0))
        };
        Ok(FlowSummary {
            flow: self.id,
            root,
            records,
            passes,
            firings: self.firings,
        })
    }

    /// Record that `rule` is about to dispatch `frame`.
    ///
    /// Returns `false` if the same record combination, or the same bindings,
    /// already fired for this rule in this flow.
    fn claim(&mut self, index: usize, frame: &Frame) -> bool {
        let by_records = (index, frame.provenance().to_vec());
        let by_bindings = (index, frame.fingerprint());
        if self.fired_provenance.contains(&by_records) || self.fired_bindings.contains(&by_bindings)
        {
            return false;
        }
        self.consumed.extend(frame.provenance().iter().copied());
        self.fired_provenance.insert(by_records);
        self.fired_bindings.insert(by_bindings);
        true
    }

    async fn fire(&mut self, index: usize, rule: &SyncRule, mut frame: Frame) -> Result<()> {
        self.firings += 1;
        let logging = self.engine.inner.config.logging;
        if logging.traces_syncs() {
            tracing::info!(
                sync = %rule.name,
                records = ?frame.provenance(),
                frame = %summarize(&frame.to_record()),
                "sync fired"
            );
        }

        if let Some(missing) = self.engine.inner.required[index]
            .iter()
            .find(|v| !frame.is_bound(**v))
        {
            let (concept, operation) = rule
                .then
                .first()
                .map(|i| (i.concept.clone(), i.operation.clone()))
                .unwrap_or_default();
            tracing::error!(sync = %rule.name, variable = %missing, "where clause left a variable unbound");
            return Err(ConcordError::UnboundVariable {
                sync: rule.name.clone(),
                variable: missing.name().to_string(),
                concept,
                operation,
            });
        }

        for invocation in &rule.then {
            let args = invocation.arguments(&frame).map_err(|var| {
                ConcordError::UnboundVariable {
                    sync: rule.name.clone(),
                    variable: var.name().to_string(),
                    concept: invocation.concept.clone(),
                    operation: invocation.operation.clone(),
                }
            })?;
            let record = self
                .perform(&invocation.concept, &invocation.operation, args)
                .await?;
            let Some(outputs) = record.outcome.outputs() else {
                if logging.traces_syncs() {
                    tracing::info!(
                        sync = %rule.name,
                        failed = %format!("{}.{}", record.concept, record.operation),
                        "remaining invocations skipped"
                    );
                }
                break;
            };
            for (field, var) in &invocation.binds {
                let value = outputs.get(field).cloned().unwrap_or(Value::Null);
                frame = frame.with(*var, value);
            }
        }
        Ok(())
    }

    /// Invoke one operation and append its record.
    async fn perform(
        &mut self,
        concept: &str,
        operation: &str,
        inputs: Record,
    ) -> Result<Arc<ActionRecord>> {
        let op = self.engine.inner.registry.lookup(concept, operation)?;
        let outcome = match op.call(inputs.clone()).await {
            Ok(outputs) => Outcome::Ok { outputs },
            Err(e) => Outcome::Err {
                error: e.to_string(),
            },
        };

        let record = ActionRecord {
            sequence: next_sequence(),
            flow: self.id,
            concept: concept.to_string(),
            operation: operation.to_string(),
            inputs,
            outcome,
        };

        if self.engine.inner.config.logging.traces_actions() {
            match &record.outcome {
                Outcome::Ok { outputs } => tracing::info!(
                    seq = record.sequence,
                    inputs = %summarize(&record.inputs),
                    outputs = %summarize(outputs),
                    "{concept}.{operation}"
                ),
                Outcome::Err { error } => tracing::info!(
                    seq = record.sequence,
                    inputs = %summarize(&record.inputs),
                    error = %error,
                    "{concept}.{operation} failed"
                ),
            }
        }

        Ok(self.log.append(record))
    }

    fn report_unconsumed_failures(&self) {
        for record in self.log.iter() {
            if let Outcome::Err { error } = &record.outcome {
                if !self.consumed.contains(&record.sequence) {
                    tracing::warn!(
                        seq = record.sequence,
                        action = %format!("{}.{}", record.concept, record.operation),
                        error = %error,
                        "failure not handled by any synchronization"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FlowSummary
// ---------------------------------------------------------------------------

/// What a settled flow did. The log itself is dropped with the flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSummary {
    pub flow: Uuid,
    /// The bootstrap record.
    pub root: Option<ActionRecord>,
    /// Every record appended after the bootstrap, in sequence order.
    pub records: Vec<ActionRecord>,
    pub passes: usize,
    pub firings: usize,
}

impl FlowSummary {
    /// Outcome of the bootstrap action.
    pub fn outcome(&self) -> Option<&Outcome> {
        self.root.as_ref().map(|r| &r.outcome)
    }

    /// Records of one concept operation appended by the cascade.
    pub fn of<'a>(
        &'a self,
        concept: &'a str,
        operation: &'a str,
    ) -> impl Iterator<Item = &'a ActionRecord> + 'a {
        self.records.iter().filter(move |r| r.is(concept, operation))
    }

    /// `Concept.operation` of every cascade record, in order.
    pub fn trail(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| format!("{}.{}", r.concept, r.operation))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept::Operation;
    use crate::pattern::{Pattern, Vars};
    use crate::sync::Invocation;
    use crate::value::record;
    use serde_json::json;

    fn counter_registry() -> ConceptRegistry {
        let mut r = ConceptRegistry::new();
        r.register_operations(
            "Counter",
            vec![
                Operation::raw("start", |i| async move { Ok(i) }),
                Operation::raw("bump", |i: Record| async move {
                    let n = i.get("n").and_then(Value::as_i64).unwrap_or(0);
                    Ok(record(json!({ "n": n + 1 })))
                }),
                Operation::raw("fail", |_| async move {
                    Err(crate::error::ConceptError::failed("boom"))
                }),
            ],
        )
        .unwrap();
        r
    }

    fn bump_chain(v: &mut Vars) -> SyncRule {
        let [n, m] = v.vars(["n", "m"]);
        SyncRule::new("BumpChain")
            .when(Pattern::new("Counter", "start").input_var(n))
            .then(Invocation::new("Counter", "bump").arg_var(n).bind("n", m))
            .then(Invocation::new("Counter", "bump").arg("n", m))
    }

    #[tokio::test]
    async fn then_outputs_chain_into_later_invocations() {
        let engine = Engine::builder(counter_registry())
            .sync(bump_chain)
            .build()
            .unwrap();
        let summary = engine
            .invoke("Counter", "start", record(json!({ "n": 1 })))
            .await
            .unwrap();
        let outs: Vec<i64> = summary
            .of("Counter", "bump")
            .map(|r| r.output("n").unwrap().as_i64().unwrap())
            .collect();
        assert_eq!(outs, vec![2, 3]);
        assert_eq!(summary.firings, 1);
        assert_eq!(summary.passes, 2);
    }

    #[tokio::test]
    async fn failed_invocation_stops_the_then_list() {
        fn rule(v: &mut Vars) -> SyncRule {
            let n = v.var("n");
            SyncRule::new("FailFirst")
                .when(Pattern::new("Counter", "start").input_var(n))
                .then(Invocation::new("Counter", "fail"))
                .then(Invocation::new("Counter", "bump").arg_var(n))
        }
        let engine = Engine::builder(counter_registry()).sync(rule).build().unwrap();
        let summary = engine
            .invoke("Counter", "start", record(json!({ "n": 1 })))
            .await
            .unwrap();
        assert_eq!(summary.trail(), vec!["Counter.fail"]);
        assert_eq!(summary.records[0].outcome.error(), Some("boom"));
    }

    #[tokio::test]
    async fn sequences_increase_within_a_flow() {
        let engine = Engine::builder(counter_registry())
            .sync(bump_chain)
            .build()
            .unwrap();
        let summary = engine
            .invoke("Counter", "start", record(json!({ "n": 0 })))
            .await
            .unwrap();
        let root = summary.root.as_ref().unwrap().sequence;
        let seqs: Vec<u64> = summary.records.iter().map(|r| r.sequence).collect();
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        assert!(seqs[0] > root);
        assert!(summary.records.iter().all(|r| r.flow == summary.flow));
    }

    #[tokio::test]
    async fn max_passes_bounds_divergent_cascades() {
        fn diverge(v: &mut Vars) -> SyncRule {
            let n = v.var("n");
            SyncRule::new("Diverge")
                .when(Pattern::new("Counter", "bump").output_var(n))
                .then(Invocation::new("Counter", "bump").arg_var(n))
        }
        fn kick(v: &mut Vars) -> SyncRule {
            let n = v.var("n");
            SyncRule::new("Kick")
                .when(Pattern::new("Counter", "start").input_var(n))
                .then(Invocation::new("Counter", "bump").arg_var(n))
        }
        let engine = Engine::builder(counter_registry())
            .config(EngineConfig {
                logging: EngineLogging::Off,
                max_passes: Some(5),
            })
            .sync(kick)
            .sync(diverge)
            .build()
            .unwrap();
        let err = engine
            .invoke("Counter", "start", record(json!({ "n": 0 })))
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::NoFixpoint { passes: 5, .. }), "{err}");
    }

    #[tokio::test]
    async fn where_that_drops_a_promised_binding_fails_closed() {
        fn rule(v: &mut Vars) -> SyncRule {
            let [n, label] = v.vars(["n", "label"]);
            SyncRule::new("Forgetful")
                .when(Pattern::new("Counter", "start").input_var(n))
                .where_frames([label], |frames| frames)
                .then(Invocation::new("Counter", "bump").arg("n", label))
        }
        let engine = Engine::builder(counter_registry()).sync(rule).build().unwrap();
        let err = engine
            .invoke("Counter", "start", record(json!({ "n": 0 })))
            .await
            .unwrap_err();
        match err {
            ConcordError::UnboundVariable { variable, .. } => assert_eq!(variable, "label"),
            other => panic!("expected UnboundVariable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn begin_exposes_the_bootstrap_record() {
        let engine = Engine::builder(counter_registry()).build().unwrap();
        let flow = engine
            .begin("Counter", "bump", record(json!({ "n": 41 })))
            .await
            .unwrap();
        assert_eq!(flow.root().unwrap().output("n"), Some(&json!(42)));
        let summary = flow.settle().await.unwrap();
        assert!(summary.records.is_empty());
        assert_eq!(summary.passes, 1);
    }

    #[tokio::test]
    async fn unknown_bootstrap_operation_is_an_error() {
        let engine = Engine::builder(counter_registry()).build().unwrap();
        let err = engine
            .invoke("Counter", "reset", Record::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConcordError::OperationNotFound { .. }));
    }

    #[test]
    fn duplicate_rule_names_are_rejected() {
        let err = Engine::builder(counter_registry())
            .sync(bump_chain)
            .sync(bump_chain)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConcordError::DuplicateRule(name) if name == "BumpChain"));
    }
}
