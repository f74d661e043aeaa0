pub mod action;
pub mod concept;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod matcher;
pub mod pattern;
pub mod sync;
pub mod value;

pub use action::{ActionLog, ActionRecord, Outcome};
pub use concept::{Concept, ConceptRegistry, Operation, OperationResult};
pub use config::{Config, EngineConfig, EngineLogging};
pub use engine::{Engine, EngineBuilder, Flow, FlowSummary};
pub use error::{ConceptError, ConcordError, Result};
pub use frame::Frame;
pub use pattern::{Pattern, Term, Var, Vars};
pub use sync::{Invocation, SyncDefinition, SyncRule, SyncSummary};
pub use value::{record, Record, Value};
