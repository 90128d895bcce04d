// ============================================================================
// Transaction Scope State
// ============================================================================
//
// A session is either idle or inside one transaction scope. Nested entries
// only move the depth; the scope owns the leased connection and the
// auto-commit flag it found on entry.
//
//   Idle ──enter──> Active(depth = 1) ──enter──> Active(depth = 2) ...
//     ^                   │
//     └── outermost exit ─┘   commit | rollback, restore, release
//
// ============================================================================

use crate::connection::pool::PoolGuard;
use crate::core::Result;

/// The connection and bookkeeping of an open scope.
pub(crate) struct ActiveScope {
    pub(crate) lease: PoolGuard,
    pub(crate) depth: usize,
    pub(crate) saved_auto_commit: bool,
    pub(crate) rollback_only: bool,
}

impl ActiveScope {
    /// Ends the scope in this order: commit or roll back, restore the saved
    /// auto-commit flag, release the lease.
    pub(crate) fn finish(mut self, commit: bool) -> Result<()> {
        let id = self.lease.id();
        let conn = self.lease.connection();

        let ended = if commit {
            conn.commit().or_else(|err| {
                tracing::warn!(connection = id, error = %err, "commit failed; rolling back");
                conn.rollback()?;
                Err(err)
            })
        } else {
            conn.rollback()
        };
        let restored = conn.set_auto_commit(self.saved_auto_commit);

        tracing::debug!(connection = id, commit, "transaction finished");
        drop(self.lease);

        ended.and(restored)
    }
}

pub(crate) enum TransactionState {
    Idle,
    Active(ActiveScope),
}

impl TransactionState {
    pub(crate) fn view(&self) -> ScopeState {
        match self {
            TransactionState::Idle => ScopeState::Idle,
            TransactionState::Active(scope) => ScopeState::Active {
                depth: scope.depth,
                rollback_only: scope.rollback_only,
            },
        }
    }
}

/// Observable state of a [`Session`](super::Session).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// No transaction; plain requests lease short-lived connections.
    Idle,

    /// Inside a transaction `depth` levels deep.
    Active { depth: usize, rollback_only: bool },
}

impl ScopeState {
    pub fn is_active(&self) -> bool {
        matches!(self, ScopeState::Active { .. })
    }

    pub fn depth(&self) -> usize {
        match self {
            ScopeState::Idle => 0,
            ScopeState::Active { depth, .. } => *depth,
        }
    }
}

impl std::fmt::Display for ScopeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeState::Idle => write!(f, "IDLE"),
            ScopeState::Active {
                depth,
                rollback_only: false,
            } => write!(f, "ACTIVE(depth={})", depth),
            ScopeState::Active {
                depth,
                rollback_only: true,
            } => write!(f, "ACTIVE(depth={}, rollback-only)", depth),
        }
    }
}
