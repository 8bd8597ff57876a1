//! # Speech Engine Boundary
//!
//! The relay consumes the external speech-to-text engine as a black box
//! behind the [`SpeechEngine`] trait: submit a parameter set plus a
//! pull-based audio chunk sequence, get back a pull-based sequence of result
//! batches. Everything the engine does internally (recognition, credentials,
//! transport) stays on the far side of this boundary.
//!
//! ## Key Components:
//! - **SpeechEngine**: the streaming contract implemented by backends
//! - **StreamingRequest**: validated per-session parameters in wire form
//! - **ResultBatch / RecognitionResult**: one unit of engine output with
//!   ranked text alternatives, tagged partial or final
//! - **build_engine**: constructs the configured backend at startup

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::error::AppError;

pub mod stub;

/// Pull-based sequence of audio chunks handed to the engine.
///
/// Chunks arrive in network order; a zero-length chunk is the explicit end
/// marker and, when present, is always the last item.
pub type AudioChunkStream = BoxStream<'static, Bytes>;

/// Pull-based sequence of result batches produced by the engine.
///
/// The stream may yield an error mid-flight; the relay stops consuming at
/// the first one.
pub type ResultStream = BoxStream<'static, Result<ResultBatch, AppError>>;

/// Validated per-session parameters in the form the engine consumes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StreamingRequest {
    /// BCP-47 locale tag, e.g. "en-US"
    pub language: String,

    /// Audio encoding wire name, e.g. "LINEAR16"
    pub encoding: String,

    /// Sample rate in hertz
    pub sample_rate: u32,

    /// Whether the engine should emit provisional (partial) results
    pub interim_results: bool,
}

/// One ranked transcription hypothesis.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptAlternative {
    /// Transcribed text for this hypothesis
    pub transcript: String,

    /// Engine confidence in [0.0, 1.0]
    pub confidence: f32,
}

/// One unit of engine output: a partial or final result with its ranked
/// alternatives, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Whether the engine guarantees this text will not change further
    pub is_final: bool,

    /// Ranked hypotheses; may be empty when the engine produced no text
    pub alternatives: Vec<TranscriptAlternative>,
}

impl RecognitionResult {
    /// Best-ranked non-empty transcript, if one exists.
    pub fn best_transcript(&self) -> Option<&str> {
        self.alternatives
            .first()
            .map(|alt| alt.transcript.as_str())
            .filter(|text| !text.is_empty())
    }
}

/// One batch of results as emitted by the engine. A batch may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultBatch {
    pub results: Vec<RecognitionResult>,
}

/// Streaming contract implemented by speech-to-text backends.
///
/// `open_stream` resolves once the engine has accepted the request; the
/// caller races it against the startup timeout. The returned stream is the
/// session's result sequence. Backends observe `cancel` and unwind promptly
/// when it fires, both while accepting and mid-stream.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn open_stream(
        &self,
        request: StreamingRequest,
        audio: AudioChunkStream,
        cancel: CancellationToken,
    ) -> Result<ResultStream, AppError>;
}

/// Build the configured backend implementation.
pub fn build_engine(config: &AppConfig) -> Result<Arc<dyn SpeechEngine>, AppError> {
    match config.engine.provider.as_str() {
        "stub" => Ok(Arc::new(stub::StubEngine::default())),
        other => Err(AppError::Config(format!(
            "Unknown engine provider '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_transcript_takes_first_ranked_alternative() {
        let result = RecognitionResult {
            is_final: true,
            alternatives: vec![
                TranscriptAlternative {
                    transcript: "hello world".to_string(),
                    confidence: 0.92,
                },
                TranscriptAlternative {
                    transcript: "hallo word".to_string(),
                    confidence: 0.41,
                },
            ],
        };
        assert_eq!(result.best_transcript(), Some("hello world"));
    }

    #[test]
    fn test_best_transcript_rejects_missing_or_empty_text() {
        let no_alternatives = RecognitionResult {
            is_final: true,
            alternatives: vec![],
        };
        assert_eq!(no_alternatives.best_transcript(), None);

        let empty_text = RecognitionResult {
            is_final: false,
            alternatives: vec![TranscriptAlternative {
                transcript: String::new(),
                confidence: 0.0,
            }],
        };
        assert_eq!(empty_text.best_transcript(), None);
    }

    #[test]
    fn test_build_engine_rejects_unknown_provider() {
        let mut config = AppConfig::default();
        config.engine.provider = "acme-cloud".to_string();
        assert!(build_engine(&config).is_err());
    }

    #[test]
    fn test_build_engine_constructs_stub() {
        let config = AppConfig::default();
        assert!(build_engine(&config).is_ok());
    }
}
