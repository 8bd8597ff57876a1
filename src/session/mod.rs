//! # Transcription Session Module
//!
//! Everything owned per connection: parameter validation, the push-to-pull
//! audio bridge, the result relay, and the supervisor that wires them to the
//! external engine.
//!
//! ## Session Lifecycle:
//! 1. **Idle**: connection admitted, session object created
//! 2. **Validating**: query parameters checked against the schema
//! 3. **Streaming**: audio sequence handed to the engine, startup timeout armed
//! 4. **Draining**: audio exhausted, result events may still arrive
//! 5. **Closed**: terminal; result stream ended, client left, or timeout fired
//! 6. **Failed**: terminal; validation or engine fault (reachable from any
//!    non-Closed state)

pub mod bridge;
pub mod params;
pub mod relay;
pub mod supervisor;

pub use params::SessionParams;

use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle state of one transcription session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Admitted, not yet validated
    Idle,
    /// Parameters being checked
    Validating,
    /// Audio flowing to the engine
    Streaming,
    /// Audio finished, results still arriving
    Draining,
    /// Terminal: clean shutdown on any path
    Closed,
    /// Terminal: validation or engine fault
    Failed,
}

impl SessionState {
    /// Lowercase name used in log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Validating => "validating",
            SessionState::Streaming => "streaming",
            SessionState::Draining => "draining",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

/// The unit of work for one connection.
///
/// Owned exclusively by the supervisor of its connection; never shared
/// across connections. Holds at most one active engine call at a time.
#[derive(Debug)]
pub struct Session {
    /// Connection identity used in every log line for correlation
    pub conn_id: Uuid,

    state: SessionState,

    /// When the session was admitted
    pub started_at: Instant,
}

impl Session {
    pub fn new(conn_id: Uuid) -> Self {
        Self {
            conn_id,
            state: SessionState::Idle,
            started_at: Instant::now(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Move to the next lifecycle state.
    ///
    /// Terminal states are sticky: a transition requested after Closed or
    /// Failed is ignored, so late signals (e.g. a relay finishing after a
    /// disconnect already failed the session) cannot resurrect it.
    pub fn transition(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        debug!(
            conn_id = %self.conn_id,
            from = self.state.as_str(),
            to = next.as_str(),
            "session state transition"
        );
        self.state = next;
    }
}

/// How a finished session is communicated to the client.
///
/// Every termination path maps to exactly one of these; the WebSocket layer
/// turns them into close codes. "Busy" and the startup-timeout case are
/// deliberately distinct outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Natural end of transcription, or startup timeout reached
    Normal { reason: Option<String> },

    /// Invalid/missing parameters, or failed authorization
    PolicyViolation { reason: String },

    /// Admission limit reached
    Busy,

    /// Engine failure or unexpected internal fault
    InternalError { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_advance_through_the_lifecycle() {
        let mut session = Session::new(Uuid::new_v4());
        assert_eq!(session.state(), SessionState::Idle);

        session.transition(SessionState::Validating);
        session.transition(SessionState::Streaming);
        session.transition(SessionState::Draining);
        assert_eq!(session.state(), SessionState::Draining);

        session.transition(SessionState::Closed);
        assert_eq!(session.state(), SessionState::Closed);
    }

    #[test]
    fn test_failed_is_reachable_from_any_non_terminal_state() {
        let mut session = Session::new(Uuid::new_v4());
        session.transition(SessionState::Validating);
        session.transition(SessionState::Failed);
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        let mut session = Session::new(Uuid::new_v4());
        session.transition(SessionState::Closed);
        session.transition(SessionState::Streaming);
        assert_eq!(session.state(), SessionState::Closed);

        let mut failed = Session::new(Uuid::new_v4());
        failed.transition(SessionState::Failed);
        failed.transition(SessionState::Closed);
        assert_eq!(failed.state(), SessionState::Failed);
    }
}
