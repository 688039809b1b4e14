//! nr-rules: rule checks over a network snapshot.
//!
//! Every check is pure over a read-only `NetworkGraph` and produces typed
//! findings. Findings are keyed by kind and entity ids, so re-running the
//! engine on an unchanged graph yields the same keys and magnitudes.

pub mod config;
pub mod connectivity;
pub mod coordinate;
pub mod engine;
pub mod finding;
pub mod reference;
pub mod slope;

pub use config::RuleConfig;
pub use connectivity::{ConnectivityIndex, EndLink};
pub use engine::{ValidationReport, ValidationSummary, validate, validate_at};
pub use finding::{Finding, FindingKey, FindingKind, FindingStatus, Severity};
pub use reference::{ReferencePoint, ReferencePoints};

pub type RulesResult<T> = Result<T, RulesError>;

#[derive(thiserror::Error, Debug)]
pub enum RulesError {
    #[error("Invalid rule configuration: {0}")]
    Config(#[from] nr_core::CoreError),

    #[error("Reference point error: {0}")]
    Reference(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
