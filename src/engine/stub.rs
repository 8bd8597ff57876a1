//! `StubEngine` — placeholder backend that echoes stream metadata without
//! real recognition.
//!
//! Used during development and smoke tests before a cloud backend is wired
//! in. It accepts immediately, drains the audio sequence, and produces a
//! deterministic partial + final transcript so the full connection pipeline
//! can be exercised end-to-end.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::{
    AudioChunkStream, RecognitionResult, ResultBatch, ResultStream, SpeechEngine,
    StreamingRequest, TranscriptAlternative,
};
use crate::error::AppError;

/// Echo-style stub engine.
///
/// Emits one partial `"…"` result after the first audio chunk (only useful
/// when interim results are on) and, once the audio sequence terminates, a
/// final `"[stub: <N> bytes @ <SR> Hz]"` summary.
#[derive(Debug, Default)]
pub struct StubEngine;

#[async_trait]
impl SpeechEngine for StubEngine {
    async fn open_stream(
        &self,
        request: StreamingRequest,
        mut audio: AudioChunkStream,
        cancel: CancellationToken,
    ) -> Result<ResultStream, AppError> {
        debug!(?request, "StubEngine accepting stream");

        let (tx, rx) = mpsc::unbounded_channel::<Result<ResultBatch, AppError>>();
        let sample_rate = request.sample_rate;

        tokio::spawn(async move {
            let mut total_bytes = 0usize;
            let mut chunks = 0usize;

            loop {
                let chunk = tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("StubEngine cancelled after {} chunks", chunks);
                        return;
                    }
                    chunk = audio.next() => chunk,
                };

                match chunk {
                    // Zero-length chunk is the explicit end marker.
                    Some(chunk) if chunk.is_empty() => break,
                    Some(chunk) => {
                        if chunks == 0 {
                            let _ = tx.send(Ok(partial_batch()));
                        }
                        total_bytes += chunk.len();
                        chunks += 1;
                    }
                    // Abrupt truncation: summarize whatever arrived.
                    None => break,
                }
            }

            let _ = tx.send(Ok(final_batch(total_bytes, sample_rate)));
        });

        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}

fn partial_batch() -> ResultBatch {
    ResultBatch {
        results: vec![RecognitionResult {
            is_final: false,
            alternatives: vec![TranscriptAlternative {
                transcript: "\u{2026}".to_string(),
                confidence: 0.0,
            }],
        }],
    }
}

fn final_batch(total_bytes: usize, sample_rate: u32) -> ResultBatch {
    ResultBatch {
        results: vec![RecognitionResult {
            is_final: true,
            alternatives: vec![TranscriptAlternative {
                transcript: format!("[stub: {} bytes @ {} Hz]", total_bytes, sample_rate),
                confidence: 1.0,
            }],
        }],
    }
}
