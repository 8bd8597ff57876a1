//! # WebSocket Transcription Handler
//!
//! Handles real-time audio streaming via WebSocket. Clients connect to
//! `/ws/transcribe` with query parameters, send binary audio frames, and
//! receive transcription results as JSON messages until the session closes.
//!
//! ## WebSocket Protocol:
//! 1. **Connection**: client connects with `token` (required) plus optional
//!    `language`, `encoding`, `sampleRate`, `interimResults` parameters
//! 2. **Audio Streaming**: binary frames are opaque audio chunks
//! 3. **End of Input**: the text frame `"EOS"` marks the end of finite
//!    sources (file playback); live sources simply close the connection
//! 4. **Results**: `{"partialTranscript": …}` / `{"transcript": …}` in
//!    engine order, `{"error": …}` immediately before an error close
//!
//! ## Close Codes:
//! - 1000 normal: natural end of transcription, or startup timeout
//! - 1008 policy: invalid/missing parameters, failed authorization
//! - 1013 again: admission limit reached ("server busy")
//! - 1011 error: engine failure, unexpected internal fault
//!
//! ## Actor Model:
//! Each connection is one Actix actor. The actor owns the push side of the
//! audio bridge, the admission permit, and the cancellation token; the
//! supervisor task owns everything else. Whichever side terminates first,
//! all paths converge on the actor's `stopped` hook: cancel (idempotent),
//! drop the feed (closes the bridge), drop the permit (frees the slot).

use crate::admission::{ConnectionLimiter, ConnectionPermit};
use crate::config::AppConfig;
use crate::engine::SpeechEngine;
use crate::session::{bridge, supervisor, CloseOutcome, Session, SessionParams, SessionState};
use crate::state::AppState;

use actix::prelude::*;
use actix_web::{web, HttpRequest, HttpResponse, Result as ActixResult};
use actix_web_actors::ws;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Text frame a finite source sends once all audio has been emitted.
pub const END_OF_STREAM: &str = "EOS";

/// Client-facing messages, one JSON object each.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClientMessage {
    /// Provisional transcript fragment; may still be revised
    #[serde(rename = "partialTranscript")]
    PartialTranscript(String),

    /// Transcript fragment the engine guarantees will not change
    #[serde(rename = "transcript")]
    Transcript(String),

    /// Error description; always immediately followed by closure
    #[serde(rename = "error")]
    Error(String),
}

/// Map a session outcome onto the close frame sent to the client.
///
/// Engine details never leak into the internal-error description; the
/// specifics are in the logs under the connection id.
pub fn close_reason(outcome: &CloseOutcome) -> ws::CloseReason {
    match outcome {
        CloseOutcome::Normal { reason } => ws::CloseReason {
            code: ws::CloseCode::Normal,
            description: reason.clone(),
        },
        CloseOutcome::PolicyViolation { reason } => ws::CloseReason {
            code: ws::CloseCode::Policy,
            description: Some(reason.clone()),
        },
        CloseOutcome::Busy => ws::CloseReason {
            code: ws::CloseCode::Again,
            description: Some("Server busy".to_string()),
        },
        CloseOutcome::InternalError { .. } => ws::CloseReason {
            code: ws::CloseCode::Error,
            description: Some("Internal error".to_string()),
        },
    }
}

/// What the route handler decided before the actor starts.
enum Launch {
    /// Admission refused; close immediately after the handshake.
    Busy,

    /// Slot acquired; parameters still need validation.
    Admitted {
        query: HashMap<String, String>,
        permit: ConnectionPermit,
    },
}

/// Message for forwarding one client-facing JSON object.
#[derive(Message)]
#[rtype(result = "()")]
struct Outbound(ClientMessage);

/// Message carrying the supervisor's terminal outcome.
#[derive(Message)]
#[rtype(result = "()")]
struct Finish(CloseOutcome);

/// WebSocket actor for one transcription session.
pub struct TranscribeSocket {
    /// Connection identity used for log correlation
    conn_id: Uuid,

    /// External engine shared by all sessions; each call is independent
    engine: Arc<dyn SpeechEngine>,

    /// Application configuration snapshot
    config: AppConfig,

    /// Handshake decision, consumed in `started`
    launch: Option<Launch>,

    /// Push side of the audio bridge, present once the session is running
    feed: Option<bridge::AudioFeed>,

    /// One authoritative cancellation signal per session
    cancel: CancellationToken,

    /// Admission slot; dropping the actor releases it exactly once
    _permit: Option<ConnectionPermit>,
}

impl TranscribeSocket {
    fn new(
        conn_id: Uuid,
        engine: Arc<dyn SpeechEngine>,
        config: AppConfig,
        launch: Launch,
    ) -> Self {
        Self {
            conn_id,
            engine,
            config,
            launch: Some(launch),
            feed: None,
            cancel: CancellationToken::new(),
            _permit: None,
        }
    }

    /// Close the connection with the outcome's close frame and stop.
    fn finish(&mut self, outcome: &CloseOutcome, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.close(Some(close_reason(outcome)));
        ctx.stop();
    }
}

impl Actor for TranscribeSocket {
    type Context = ws::WebsocketContext<Self>;

    /// Runs once the handshake completes; admission has already happened.
    fn started(&mut self, ctx: &mut Self::Context) {
        let launch = match self.launch.take() {
            Some(launch) => launch,
            None => return,
        };

        let (query, permit) = match launch {
            Launch::Busy => {
                info!(conn_id = %self.conn_id, "connection refused, server busy");
                self.finish(&CloseOutcome::Busy, ctx);
                return;
            }
            Launch::Admitted { query, permit } => (query, permit),
        };
        self._permit = Some(permit);

        let mut session = Session::new(self.conn_id);
        session.transition(SessionState::Validating);

        let params = match SessionParams::from_query(&query, &self.config) {
            Ok(params) => params,
            Err(err) => {
                warn!(conn_id = %self.conn_id, error = %err, "parameter validation failed");
                session.transition(SessionState::Failed);
                self.finish(
                    &CloseOutcome::PolicyViolation {
                        reason: err.to_string(),
                    },
                    ctx,
                );
                return;
            }
        };

        info!(
            conn_id = %self.conn_id,
            language = %params.language,
            encoding = %params.encoding,
            sample_rate = params.sample_rate,
            interim_results = params.interim_results,
            "session validated, starting transcription"
        );

        let (feed, audio) = bridge::channel(self.conn_id);
        self.feed = Some(feed);

        let addr = ctx.address();
        let engine = Arc::clone(&self.engine);
        let cancel = self.cancel.clone();
        let startup_timeout = Duration::from_secs(self.config.engine.startup_timeout_secs);

        // The supervisor owns the session from here; its outcome comes back
        // as a Finish message, unless the client disconnects first.
        tokio::spawn(async move {
            let message_addr = addr.clone();
            let outcome = supervisor::run(
                &mut session,
                engine,
                params,
                audio,
                cancel,
                startup_timeout,
                move |msg| message_addr.do_send(Outbound(msg)),
            )
            .await;
            addr.do_send(Finish(outcome));
        });
    }

    /// The single cleanup point: every termination path ends here exactly
    /// once. The feed and permit are dropped with the actor.
    fn stopped(&mut self, _ctx: &mut Self::Context) {
        self.cancel.cancel();
        info!(conn_id = %self.conn_id, "connection closed");
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for TranscribeSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Binary(data)) => match &self.feed {
                Some(feed) => {
                    if !feed.push(data) {
                        debug!(
                            conn_id = %self.conn_id,
                            "audio sequence already terminated, frame dropped"
                        );
                    }
                }
                None => {
                    debug!(conn_id = %self.conn_id, "audio frame before session start, dropped");
                }
            },
            Ok(ws::Message::Text(text)) => {
                if text.trim() == END_OF_STREAM {
                    if let Some(feed) = &self.feed {
                        feed.finish();
                    }
                } else {
                    // Unexpected frame content is logged and discarded; it
                    // does not terminate the session.
                    warn!(conn_id = %self.conn_id, "discarding unexpected text frame");
                }
            }
            Ok(ws::Message::Ping(data)) => {
                ctx.pong(&data);
            }
            Ok(ws::Message::Pong(_)) => {}
            Ok(ws::Message::Close(reason)) => {
                info!(conn_id = %self.conn_id, ?reason, "client closed connection");
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                warn!(conn_id = %self.conn_id, "discarding unexpected continuation frame");
            }
            Ok(ws::Message::Nop) => {}
            Err(err) => {
                error!(conn_id = %self.conn_id, error = %err, "websocket protocol error");
                self.cancel.cancel();
                ctx.stop();
            }
        }
    }
}

impl Handler<Outbound> for TranscribeSocket {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match serde_json::to_string(&msg.0) {
            Ok(json) => ctx.text(json),
            Err(err) => error!(conn_id = %self.conn_id, error = %err, "message serialization failed"),
        }
    }
}

impl Handler<Finish> for TranscribeSocket {
    type Result = ();

    fn handle(&mut self, msg: Finish, ctx: &mut Self::Context) {
        debug!(conn_id = %self.conn_id, outcome = ?msg.0, "session finished");
        self.finish(&msg.0, ctx);
    }
}

/// WebSocket endpoint handler.
///
/// Admission runs here, before any per-session resource is allocated; a
/// refused connection still completes the handshake so the client receives
/// the "server busy" close frame rather than a bare HTTP error.
pub async fn transcribe(
    req: HttpRequest,
    stream: web::Payload,
    app_state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let conn_id = Uuid::new_v4();
    info!(
        conn_id = %conn_id,
        peer = ?req.connection_info().peer_addr(),
        "new websocket connection request"
    );

    let query =
        web::Query::<HashMap<String, String>>::from_query(req.query_string())
            .unwrap_or_else(|_| web::Query(HashMap::new()));

    let launch = match ConnectionLimiter::try_acquire(app_state.limiter()) {
        Some(permit) => Launch::Admitted {
            query: query.into_inner(),
            permit,
        },
        None => Launch::Busy,
    };

    let socket = TranscribeSocket::new(
        conn_id,
        app_state.engine(),
        app_state.get_config(),
        launch,
    );

    ws::start(socket, &req, stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_messages_serialize_to_single_key_objects() {
        let partial = ClientMessage::PartialTranscript("hel".to_string());
        assert_eq!(
            serde_json::to_string(&partial).unwrap(),
            r#"{"partialTranscript":"hel"}"#
        );

        let final_msg = ClientMessage::Transcript("hello world".to_string());
        assert_eq!(
            serde_json::to_string(&final_msg).unwrap(),
            r#"{"transcript":"hello world"}"#
        );

        let error = ClientMessage::Error("boom".to_string());
        assert_eq!(serde_json::to_string(&error).unwrap(), r#"{"error":"boom"}"#);
    }

    #[test]
    fn test_close_reasons_map_outcomes_to_distinct_codes() {
        let normal = close_reason(&CloseOutcome::Normal { reason: None });
        assert_eq!(normal.code, ws::CloseCode::Normal);
        assert!(normal.description.is_none());

        let timeout = close_reason(&CloseOutcome::Normal {
            reason: Some("too slow".to_string()),
        });
        assert_eq!(timeout.code, ws::CloseCode::Normal);
        assert_eq!(timeout.description.as_deref(), Some("too slow"));

        let policy = close_reason(&CloseOutcome::PolicyViolation {
            reason: "Invalid token".to_string(),
        });
        assert_eq!(policy.code, ws::CloseCode::Policy);

        let busy = close_reason(&CloseOutcome::Busy);
        assert_eq!(busy.code, ws::CloseCode::Again);

        let internal = close_reason(&CloseOutcome::InternalError {
            reason: "engine exploded".to_string(),
        });
        assert_eq!(internal.code, ws::CloseCode::Error);
        // Internal details stay out of the close frame.
        assert_eq!(internal.description.as_deref(), Some("Internal error"));
    }
}
