//! nr-sync: bidirectional reconciliation between the model and the store.
//!
//! Contains:
//! - state (per-entity classification from revision stamps)
//! - plan (parallel classification of a whole snapshot)
//! - gate (propose/confirm review of model writebacks)
//! - ledger (merging validation runs into the stored findings)
//! - retry, locks, cancel (call policy and concurrency guards)
//! - coordinator (the reconciliation cycle itself)
//! - report (cycle and batch results)

pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod locks;
pub mod plan;
pub mod report;
pub mod retry;
pub mod state;

pub use cancel::CancelToken;
pub use coordinator::{Resolution, SyncCoordinator, SyncMode, SyncOptions, SyncStage};
pub use error::{Side, SyncError, SyncResult};
pub use gate::{
    AcceptAll, AcceptIds, RejectAll, Review, WritebackProposal, WritebackReviewer, propose_writeback,
};
pub use ledger::{LedgerDelta, acknowledge, merge_findings};
pub use locks::{EntityGuard, EntityLocks};
pub use plan::{EntityPlan, SyncPlan};
pub use report::{BatchOutcome, ConflictEntry, EntityFailure, SyncReport};
pub use retry::{RetryConfig, Retryable, with_deadline};
pub use state::{SyncState, classify, same_fields};
