use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{SyncError, SyncResult};

/// Shared cancellation flag.
///
/// Checked between entities, never inside one collaborator call, so a
/// cancelled cycle never leaves an entity half-written.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(a.check().is_ok());
        b.cancel();
        assert!(matches!(a.check(), Err(SyncError::Cancelled)));
    }
}
