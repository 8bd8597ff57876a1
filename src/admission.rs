//! # Admission Control
//!
//! Tracks the number of currently active transcription sessions against a
//! configured ceiling and refuses new sessions before any per-session
//! resource is allocated. Refusal is a normal policy decision under load,
//! surfaced to the client as a "server busy" close, not as an error.
//!
//! ## Counting discipline:
//! The counter is a single process-wide atomic. It is incremented only by a
//! successful [`ConnectionLimiter::try_acquire`] and decremented only by the
//! returned [`ConnectionPermit`]'s drop. Permits cannot be cloned, so every
//! admitted session releases its slot exactly once, whichever termination
//! path runs first.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Process-wide gauge of active sessions with a hard ceiling.
#[derive(Debug)]
pub struct ConnectionLimiter {
    /// Currently admitted sessions.
    active: AtomicUsize,

    /// Maximum number of concurrent sessions allowed.
    max_sessions: usize,
}

impl ConnectionLimiter {
    /// Create a new limiter with the given ceiling.
    pub fn new(max_sessions: usize) -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            max_sessions,
        })
    }

    /// Try to admit one session.
    ///
    /// Returns `None` without side effects when the active count has reached
    /// the ceiling; otherwise atomically increments the count and returns the
    /// permit that owns the slot.
    pub fn try_acquire(limiter: &Arc<Self>) -> Option<ConnectionPermit> {
        let mut current = limiter.active.load(Ordering::Acquire);
        loop {
            if current >= limiter.max_sessions {
                return None;
            }
            match limiter.active.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(active = current + 1, max = limiter.max_sessions, "session admitted");
                    return Some(ConnectionPermit {
                        limiter: Arc::clone(limiter),
                    });
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Number of currently admitted sessions.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Configured ceiling.
    pub fn max_sessions(&self) -> usize {
        self.max_sessions
    }

    /// Release one slot. Only reachable through [`ConnectionPermit`]'s drop,
    /// so the count can never go negative.
    fn release(&self) {
        let before = self.active.fetch_sub(1, Ordering::AcqRel);
        debug!(active = before.saturating_sub(1), "session slot released");
    }
}

/// RAII handle for one admitted session's slot.
///
/// Held by the session's WebSocket actor for its whole lifetime; dropping the
/// actor on any termination path decrements the counter exactly once.
#[derive(Debug)]
pub struct ConnectionPermit {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionPermit {
    fn drop(&mut self) {
        self.limiter.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_up_to_the_ceiling() {
        let limiter = ConnectionLimiter::new(2);

        let first = ConnectionLimiter::try_acquire(&limiter);
        let second = ConnectionLimiter::try_acquire(&limiter);
        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(limiter.active(), 2);

        // The (K+1)-th attempt is refused with no side effects.
        assert!(ConnectionLimiter::try_acquire(&limiter).is_none());
        assert_eq!(limiter.active(), 2);
    }

    #[test]
    fn test_released_slot_is_reusable() {
        let limiter = ConnectionLimiter::new(1);

        let permit = ConnectionLimiter::try_acquire(&limiter).expect("first admit");
        assert!(ConnectionLimiter::try_acquire(&limiter).is_none());

        drop(permit);
        assert_eq!(limiter.active(), 0);
        assert!(ConnectionLimiter::try_acquire(&limiter).is_some());
    }

    #[test]
    fn test_permit_drop_decrements_exactly_once() {
        let limiter = ConnectionLimiter::new(4);

        let permit = ConnectionLimiter::try_acquire(&limiter).expect("admit");
        assert_eq!(limiter.active(), 1);
        drop(permit);
        assert_eq!(limiter.active(), 0);

        // Nothing else can decrement: the counter stays at zero.
        assert_eq!(limiter.active(), 0);
    }

    #[test]
    fn test_concurrent_acquisition_never_exceeds_ceiling() {
        let limiter = ConnectionLimiter::new(8);
        let mut handles = Vec::new();

        for _ in 0..16 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || ConnectionLimiter::try_acquire(&limiter)));
        }

        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().expect("acquire thread"))
            .collect();

        assert_eq!(permits.len(), 8);
        assert_eq!(limiter.active(), 8);

        drop(permits);
        assert_eq!(limiter.active(), 0);
    }
}
