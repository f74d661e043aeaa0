use thiserror::Error;

/// Authoring, registration and configuration errors.
///
/// These are fatal at startup. Failures raised by concept operations are not
/// represented here; they are recorded as data (see [`ConceptError`]).
#[derive(Debug, Error)]
pub enum ConcordError {
    #[error("concept already registered: {0}")]
    DuplicateConcept(String),

    #[error("operation already registered: {concept}.{operation}")]
    DuplicateOperation { concept: String, operation: String },

    #[error("synchronization already registered: {0}")]
    DuplicateRule(String),

    #[error("unknown concept '{concept}' referenced by sync '{sync}'")]
    UnknownConcept { sync: String, concept: String },

    #[error("unknown operation '{concept}.{operation}' referenced by sync '{sync}'")]
    UnknownOperation {
        sync: String,
        concept: String,
        operation: String,
    },

    #[error("sync '{sync}' references undeclared {direction} field '{field}' of {concept}.{operation}")]
    UnknownField {
        sync: String,
        concept: String,
        operation: String,
        direction: &'static str,
        field: String,
    },

    #[error("sync '{sync}' uses unbound variable '{variable}' in {concept}.{operation}")]
    UnboundVariable {
        sync: String,
        variable: String,
        concept: String,
        operation: String,
    },

    #[error("sync '{0}' has an empty when clause")]
    EmptyWhen(String),

    #[error("no concept '{0}' is registered")]
    ConceptNotFound(String),

    #[error("no operation '{concept}.{operation}' is registered")]
    OperationNotFound { concept: String, operation: String },

    #[error("flow {flow} did not reach a fixpoint within {passes} passes")]
    NoFixpoint { flow: uuid::Uuid, passes: usize },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure signalled by a concept operation.
///
/// The engine never propagates these as Rust errors; each one becomes an
/// action record with an error marker so synchronizations can react to it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConceptError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("operation returned a non-record output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Failed(String),
}

impl ConceptError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ConcordError>;
