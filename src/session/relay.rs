//! # Result Relay
//!
//! Consumes the engine's result-event sequence and emits client-facing
//! messages in the exact order the engine produced the underlying results.
//! Classification rules:
//! - final results are always forwarded as `{"transcript": …}`
//! - partial results become `{"partialTranscript": …}` only when the
//!   session's interim-results preference is enabled
//! - results with no extractable text are logged and skipped; the session
//!   stays alive
//! - a stream fault forwards one generic `{"error": …}` message and stops
//!   consumption; the supervisor then closes with an internal-error outcome

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::engine::ResultStream;
use crate::error::AppError;
use crate::websocket::ClientMessage;

/// Why the relay loop stopped.
#[derive(Debug)]
pub enum RelayOutcome {
    /// The engine's result sequence ended naturally
    Completed,

    /// The session's cancellation token fired mid-relay
    Cancelled,

    /// The result sequence raised a fault; the error message has already
    /// been sent to the client
    EngineFailed(AppError),
}

/// Drive the engine's result stream to completion.
///
/// `send` is invoked once per forwarded message, synchronously and from this
/// single loop, which is what preserves engine-emission order end to end.
pub async fn relay_results<F>(
    conn_id: Uuid,
    mut results: ResultStream,
    interim_results: bool,
    cancel: &CancellationToken,
    mut send: F,
) -> RelayOutcome
where
    F: FnMut(ClientMessage),
{
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(conn_id = %conn_id, "relay unwinding on cancellation");
                return RelayOutcome::Cancelled;
            }
            next = results.next() => next,
        };

        match next {
            None => return RelayOutcome::Completed,
            Some(Err(err)) => {
                warn!(conn_id = %conn_id, error = %err, "engine result stream failed");
                send(ClientMessage::Error(
                    "Transcription failed due to an internal error".to_string(),
                ));
                return RelayOutcome::EngineFailed(err);
            }
            Some(Ok(batch)) => {
                for result in batch.results {
                    let text = match result.best_transcript() {
                        Some(text) => text.to_string(),
                        None => {
                            warn!(
                                conn_id = %conn_id,
                                is_final = result.is_final,
                                "discarding result with no extractable text"
                            );
                            continue;
                        }
                    };

                    if result.is_final {
                        send(ClientMessage::Transcript(text));
                    } else if interim_results {
                        send(ClientMessage::PartialTranscript(text));
                    }
                }
            }
        }
    }
}
