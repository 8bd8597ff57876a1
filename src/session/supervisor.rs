//! # Session Supervisor
//!
//! Drives one validated session from engine submission to its terminal
//! state: submits the bridge's chunk sequence to the engine under the
//! startup timeout, walks the lifecycle state machine, and relays results
//! until one side terminates. The returned [`CloseOutcome`] is the single
//! value the WebSocket layer turns into the session's one close event.
//!
//! ## Termination mapping:
//! - startup timeout → normal closure with an explanatory reason (the
//!   request could not be serviced in time; not a server fault)
//! - engine submission failure → `{"error": …}` then internal-error closure
//! - engine stream fault → internal-error closure (relay already sent the
//!   error message)
//! - cancellation (disconnect, shutdown) → normal closure; the client is
//!   usually gone by then
//! - natural end of the result sequence → normal closure

use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::SpeechEngine;
use crate::session::bridge::AudioStream;
use crate::session::relay::{self, RelayOutcome};
use crate::session::{CloseOutcome, Session, SessionParams, SessionState};
use crate::websocket::ClientMessage;

/// Run one session to completion.
///
/// The startup timeout is the only time-based contract: it races the
/// engine's acceptance of the request and is dropped the moment streaming
/// is confirmed. Cancellation is observed at every suspension point, and
/// triggering the token more than once is a safe no-op.
pub async fn run<F>(
    session: &mut Session,
    engine: Arc<dyn SpeechEngine>,
    params: SessionParams,
    audio: AudioStream,
    cancel: CancellationToken,
    startup_timeout: Duration,
    mut send: F,
) -> CloseOutcome
where
    F: FnMut(ClientMessage),
{
    let conn_id = session.conn_id;
    let mut drained = audio.drained_signal();

    session.transition(SessionState::Streaming);
    let open = engine.open_stream(params.to_streaming_request(), audio.boxed(), cancel.clone());

    let results = tokio::select! {
        _ = cancel.cancelled() => {
            // Client left (or the server is shutting down) before the engine
            // accepted; nothing to relay.
            session.transition(SessionState::Closed);
            return CloseOutcome::Normal { reason: None };
        }
        accepted = tokio::time::timeout(startup_timeout, open) => match accepted {
            Err(_elapsed) => {
                warn!(
                    conn_id = %conn_id,
                    timeout_secs = startup_timeout.as_secs(),
                    "engine did not accept the stream before the startup timeout"
                );
                cancel.cancel();
                session.transition(SessionState::Closed);
                return CloseOutcome::Normal {
                    reason: Some("Transcription could not be started in time".to_string()),
                };
            }
            Ok(Err(err)) => {
                warn!(conn_id = %conn_id, error = %err, "engine rejected the streaming request");
                send(ClientMessage::Error(
                    "Transcription failed to start".to_string(),
                ));
                session.transition(SessionState::Failed);
                return CloseOutcome::InternalError {
                    reason: err.to_string(),
                };
            }
            Ok(Ok(results)) => results,
        },
    };

    info!(conn_id = %conn_id, "engine accepted stream, relaying results");

    let relay = relay::relay_results(conn_id, results, params.interim_results, &cancel, &mut send);
    tokio::pin!(relay);

    let mut draining = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut relay => break outcome,
            changed = drained.changed(), if !draining => {
                // Audio exhausted (end marker or disconnect); result events
                // may still arrive. Err means the stream is gone, which
                // implies the same thing.
                let _ = changed;
                draining = true;
                session.transition(SessionState::Draining);
            }
        }
    };

    match outcome {
        RelayOutcome::Completed => {
            info!(
                conn_id = %conn_id,
                elapsed_ms = session.started_at.elapsed().as_millis() as u64,
                "result sequence complete"
            );
            session.transition(SessionState::Closed);
            CloseOutcome::Normal { reason: None }
        }
        RelayOutcome::Cancelled => {
            session.transition(SessionState::Closed);
            CloseOutcome::Normal { reason: None }
        }
        RelayOutcome::EngineFailed(err) => {
            session.transition(SessionState::Failed);
            CloseOutcome::InternalError {
                reason: err.to_string(),
            }
        }
    }
}
