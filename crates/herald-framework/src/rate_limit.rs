//! Per-user admission gate with a fixed time window.
//!
//! Every admitted user gets an entry that lives for one window. While the
//! entry is live, further admissions are denied and the entry is *not*
//! refreshed, so a user spamming the bot is let through again exactly one
//! window after the last admitted event.
//!
//! The number of tracked users is bounded; when a new user would exceed the
//! capacity, the least-recently-inserted live entry is evicted.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use herald_core::UserId;

#[derive(Debug, Default)]
struct State {
    admitted: HashMap<UserId, Instant>,
    /// Insertion order; may hold stale pairs for users re-admitted later.
    queue: VecDeque<(UserId, Instant)>,
}

impl State {
    fn purge_expired(&mut self, now: Instant, window: Duration) {
        while let Some(&(user, at)) = self.queue.front() {
            if now.duration_since(at) < window {
                break;
            }
            self.queue.pop_front();
            if self.admitted.get(&user) == Some(&at) {
                self.admitted.remove(&user);
            }
        }
    }

    fn evict_oldest(&mut self) {
        while let Some((user, at)) = self.queue.pop_front() {
            if self.admitted.get(&user) == Some(&at) {
                self.admitted.remove(&user);
                trace!(user_id = user, "Evicted rate limiter entry");
                return;
            }
        }
    }
}

/// Time-windowed per-user rate limiter.
///
/// Internally synchronized and never suspends; share it behind an `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    window: Duration,
    capacity: usize,
    state: Mutex<State>,
}

impl RateLimiter {
    /// Creates a limiter admitting each user at most once per `window`,
    /// tracking at most `capacity` users (at least one).
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
        }
    }

    /// Admits `user` if it has no live entry, recording the admission.
    pub fn admit(&self, user: UserId) -> bool {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.purge_expired(now, self.window);

        if state.admitted.contains_key(&user) {
            return false;
        }
        if state.admitted.len() >= self.capacity {
            state.evict_oldest();
        }
        state.admitted.insert(user, now);
        state.queue.push_back((user, now));
        true
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut state = self.state.lock();
        state.purge_expired(Instant::now(), self.window);
        state.admitted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    const WINDOW: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_denied_within_window() {
        let limiter = RateLimiter::new(WINDOW, 100);
        assert!(limiter.admit(1));
        assert!(!limiter.admit(1));
        assert!(limiter.admit(2));

        advance(Duration::from_millis(499)).await;
        assert!(!limiter.admit(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admitted_after_window() {
        let limiter = RateLimiter::new(WINDOW, 100);
        assert!(limiter.admit(1));

        advance(WINDOW).await;
        assert!(limiter.admit(1));
        assert_eq!(limiter.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_denial_does_not_refresh_entry() {
        let limiter = RateLimiter::new(WINDOW, 100);
        assert!(limiter.admit(1));
        advance(Duration::from_millis(400)).await;
        assert!(!limiter.admit(1));
        advance(Duration::from_millis(100)).await;
        assert!(limiter.admit(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let limiter = RateLimiter::new(WINDOW, 3);
        for user in 1..=3 {
            assert!(limiter.admit(user));
            advance(Duration::from_millis(10)).await;
        }

        assert!(limiter.admit(4));
        assert_eq!(limiter.len(), 3);

        // User 1 was evicted, the others are still live.
        assert!(limiter.admit(1));
        assert!(!limiter.admit(3));
        assert!(!limiter.admit(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_do_not_count_toward_capacity() {
        let limiter = RateLimiter::new(WINDOW, 2);
        assert!(limiter.admit(1));
        assert!(limiter.admit(2));
        advance(WINDOW).await;

        assert!(limiter.admit(3));
        assert!(limiter.admit(4));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(RateLimiter::new(WINDOW, 0).capacity(), 1);
    }
}
