//! Session identity and lifecycle.

use tokio_util::sync::CancellationToken;

/// Where a search session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    CacheCheck,
    Delivering { from_cache: bool },
    Streaming,
    Committing,
    Complete,
    Failed,
    Aborted,
}

impl SessionState {
    /// Whether the session can still deliver callbacks.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::CacheCheck
                | SessionState::Delivering { .. }
                | SessionState::Streaming
                | SessionState::Committing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Complete | SessionState::Failed | SessionState::Aborted
        )
    }
}

/// How a call to `search` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Complete { total: usize, from_cache: bool },
    Failed,
    /// A newer search, or an explicit cancel, took over.
    Superseded,
}

/// Handle held by the task running one session.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub id: u64,
    pub cancel: CancellationToken,
}

/// The orchestrator's single active-session slot.
#[derive(Debug, Default)]
pub(crate) struct ActiveSlot {
    pub id: u64,
    pub cancel: CancellationToken,
    pub state: SessionState,
}

impl ActiveSlot {
    /// Whether `session` still owns the slot and has not been cancelled.
    pub fn is_current(&self, session: &Session) -> bool {
        self.id == session.id && !self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(!SessionState::Idle.is_active());
        assert!(SessionState::Streaming.is_active());
        assert!(SessionState::Delivering { from_cache: true }.is_active());
        assert!(!SessionState::Aborted.is_active());
        assert!(SessionState::Aborted.is_terminal());
        assert!(!SessionState::Committing.is_terminal());
    }

    #[test]
    fn cancelled_session_is_not_current() {
        let token = CancellationToken::new();
        let slot = ActiveSlot {
            id: 3,
            cancel: token.clone(),
            state: SessionState::Streaming,
        };
        let session = Session { id: 3, cancel: token };

        assert!(slot.is_current(&session));
        assert!(!slot.is_current(&Session { id: 2, cancel: CancellationToken::new() }));

        session.cancel.cancel();
        assert!(!slot.is_current(&session));
    }
}
