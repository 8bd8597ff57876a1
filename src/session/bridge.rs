//! # Audio Ingestion Bridge
//!
//! Converts arbitrarily-timed inbound binary frames into the demand-driven
//! chunk sequence the transcription engine consumes. The push side is fed by
//! the WebSocket actor as frames arrive; the pull side is a lazy,
//! single-pass, non-restartable `Stream` with exactly one consumer.
//!
//! ## Termination protocol:
//! - Client sends the explicit end-of-stream frame → the feed enqueues a
//!   sentinel; after draining the queue the stream yields one zero-length
//!   chunk as the end marker, then terminates.
//! - Connection closes without the sentinel → the feed is dropped and the
//!   stream simply terminates with no marker (a disconnect, not an error).
//!
//! The queue is unbounded but drains continuously while the engine is
//! streaming; chunk order is network-arrival order with no coalescing, no
//! drop, no duplication. Wake-up races between producer and suspended
//! consumer are the channel's problem, not ours.

use bytes::Bytes;
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::debug;
use uuid::Uuid;

/// Internal queue entries: ordinary payload or the end-of-stream sentinel.
#[derive(Debug)]
enum FeedEvent {
    Chunk(Bytes),
    EndOfStream,
}

/// Create a connected feed/stream pair for one session.
pub fn channel(conn_id: Uuid) -> (AudioFeed, AudioStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (drained_tx, _) = watch::channel(false);
    (
        AudioFeed { tx, conn_id },
        AudioStream {
            rx,
            conn_id,
            drained_tx,
            finished: false,
        },
    )
}

/// Push side of the bridge, held by the WebSocket actor.
///
/// Dropping the feed closes the queue: the stream sees an abrupt truncation
/// once the already-queued chunks are drained.
#[derive(Debug)]
pub struct AudioFeed {
    tx: mpsc::UnboundedSender<FeedEvent>,
    conn_id: Uuid,
}

impl AudioFeed {
    /// Enqueue one audio chunk in arrival order.
    ///
    /// Returns `false` when the consumer is gone (stream finished or
    /// dropped); the caller logs and discards the frame.
    pub fn push(&self, chunk: Bytes) -> bool {
        self.tx.send(FeedEvent::Chunk(chunk)).is_ok()
    }

    /// Signal that no more audio is coming.
    ///
    /// Used by finite sources (file playback) that finish emitting before
    /// the engine finishes processing; distinct from an abrupt close.
    pub fn finish(&self) -> bool {
        let accepted = self.tx.send(FeedEvent::EndOfStream).is_ok();
        debug!(conn_id = %self.conn_id, accepted, "end of audio stream signalled");
        accepted
    }
}

/// Pull side of the bridge: the chunk sequence handed to the engine.
pub struct AudioStream {
    rx: mpsc::UnboundedReceiver<FeedEvent>,
    conn_id: Uuid,

    /// Flips to true on every terminal path; the supervisor watches it for
    /// the Streaming → Draining transition.
    drained_tx: watch::Sender<bool>,

    finished: bool,
}

impl AudioStream {
    /// Receiver that observes the sequence terminating (end marker yielded,
    /// disconnect, or consumer abandonment).
    pub fn drained_signal(&self) -> watch::Receiver<bool> {
        self.drained_tx.subscribe()
    }

    fn terminate(&mut self) {
        self.finished = true;
        // send_replace updates the value even with no subscriber yet.
        self.drained_tx.send_replace(true);
        // Closing the receiver makes subsequent pushes fail, which is how
        // the feed side learns the consumer is gone.
        self.rx.close();
    }
}

impl Stream for AudioStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        let this = self.get_mut();

        if this.finished {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(FeedEvent::Chunk(chunk))) => Poll::Ready(Some(chunk)),
            Poll::Ready(Some(FeedEvent::EndOfStream)) => {
                debug!(conn_id = %this.conn_id, "audio sequence complete, yielding end marker");
                this.terminate();
                // The zero-length end marker; the sequence terminates on the
                // next poll.
                Poll::Ready(Some(Bytes::new()))
            }
            Poll::Ready(None) => {
                debug!(conn_id = %this.conn_id, "audio sequence truncated by disconnect");
                this.terminate();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AudioStream {
    fn drop(&mut self) {
        // Consumer abandonment counts as termination too; pushes must start
        // failing and the drained signal must fire on this path as well.
        if !self.finished {
            self.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_chunks_arrive_in_order() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        assert!(feed.push(Bytes::from_static(b"a")));
        assert!(feed.push(Bytes::from_static(b"b")));
        assert!(feed.push(Bytes::from_static(b"c")));

        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"a"));
        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"b"));
        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"c"));
    }

    #[tokio::test]
    async fn test_back_to_back_frames_are_all_delivered() {
        let (feed, stream) = channel(Uuid::new_v4());

        // No yields between pushes; nothing may be coalesced or dropped.
        for i in 0u8..100 {
            assert!(feed.push(Bytes::copy_from_slice(&[i])));
        }
        feed.finish();

        let chunks: Vec<Bytes> = stream.collect().await;
        // 100 payload chunks plus the zero-length end marker.
        assert_eq!(chunks.len(), 101);
        for (i, chunk) in chunks[..100].iter().enumerate() {
            assert_eq!(chunk.as_ref(), &[i as u8]);
        }
        assert!(chunks[100].is_empty());
    }

    #[tokio::test]
    async fn test_end_of_stream_yields_marker_then_terminates() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        feed.push(Bytes::from_static(b"audio"));
        feed.finish();

        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"audio"));
        assert_eq!(stream.next().await.unwrap(), Bytes::new());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_terminates_without_marker() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        feed.push(Bytes::from_static(b"audio"));
        drop(feed);

        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"audio"));
        // Abrupt truncation: the sequence just ends.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_genuine_empty_frame_is_ordinary_payload() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        feed.push(Bytes::new());
        feed.push(Bytes::from_static(b"more"));

        // The empty network frame passes through; the sequence continues.
        assert_eq!(stream.next().await.unwrap(), Bytes::new());
        assert_eq!(stream.next().await.unwrap(), Bytes::from_static(b"more"));
    }

    #[tokio::test]
    async fn test_pushes_fail_after_the_sequence_terminates() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        feed.finish();
        assert_eq!(stream.next().await.unwrap(), Bytes::new());
        assert!(stream.next().await.is_none());

        assert!(!feed.push(Bytes::from_static(b"late")));
        assert!(!feed.finish());
    }

    #[tokio::test]
    async fn test_drained_signal_fires_on_every_terminal_path() {
        // End marker path.
        let (feed, mut stream) = channel(Uuid::new_v4());
        let drained = stream.drained_signal();
        feed.finish();
        assert!(!*drained.borrow());
        stream.next().await;
        assert!(*drained.borrow());

        // Disconnect path.
        let (feed, mut stream) = channel(Uuid::new_v4());
        let drained = stream.drained_signal();
        drop(feed);
        stream.next().await;
        assert!(*drained.borrow());

        // Consumer abandonment path.
        let (feed, stream) = channel(Uuid::new_v4());
        let drained = stream.drained_signal();
        drop(stream);
        assert!(*drained.borrow());
        assert!(!feed.push(Bytes::from_static(b"late")));
    }

    #[tokio::test]
    async fn test_consumer_suspends_until_woken_by_new_audio() {
        let (feed, mut stream) = channel(Uuid::new_v4());

        let consumer = tokio::spawn(async move { stream.next().await });

        // Give the consumer a chance to park on the empty queue.
        tokio::task::yield_now().await;
        feed.push(Bytes::from_static(b"wake"));

        let chunk = consumer.await.unwrap().unwrap();
        assert_eq!(chunk, Bytes::from_static(b"wake"));
    }
}
