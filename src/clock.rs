//! Monotonic deadlines used by lock and transaction timeouts.

use crossbeam_channel::Receiver;
use std::time::{Duration, Instant};

/// An absolute point on the monotonic clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Deadline(Instant);

impl Deadline {
    #[inline]
    pub fn at(instant: Instant) -> Deadline {
        Deadline(instant)
    }

    /// `None` when the deadline lies beyond what the clock can represent,
    /// which is the same as never.
    #[inline]
    pub fn after(timeout: Duration) -> Option<Deadline> {
        Instant::now().checked_add(timeout).map(Deadline)
    }

    #[inline]
    pub fn instant(&self) -> Instant {
        self.0
    }

    #[inline]
    pub fn is_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// The earlier of two optional deadlines; `None` means "never".
    pub fn earliest(a: Option<Deadline>, b: Option<Deadline>) -> Option<Deadline> {
        match (a, b) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

/// One-shot timer channel firing at `deadline`, or never.
pub(crate) fn timer(deadline: Option<Deadline>) -> Receiver<Instant> {
    match deadline {
        Some(d) => crossbeam_channel::at(d.0),
        None => crossbeam_channel::never(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_earliest() {
        let near = Deadline::after(Duration::from_millis(10)).unwrap();
        let far = Deadline::after(Duration::from_secs(10)).unwrap();
        assert_eq!(Deadline::earliest(Some(near), Some(far)), Some(near));
        assert_eq!(Deadline::earliest(Some(far), Some(near)), Some(near));
        assert_eq!(Deadline::earliest(None, Some(far)), Some(far));
        assert_eq!(Deadline::earliest(Some(near), None), Some(near));
        assert_eq!(Deadline::earliest(None, None), None);
    }

    #[test]
    fn test_elapsed() {
        let past = Deadline::at(Instant::now());
        assert!(past.is_elapsed());
        assert_eq!(past.remaining(), Duration::from_secs(0));

        let future = Deadline::after(Duration::from_secs(60)).unwrap();
        assert!(!future.is_elapsed());
        assert!(future.remaining() > Duration::from_secs(30));
    }

    #[test]
    fn test_unrepresentable_deadline_is_never() {
        assert_eq!(Deadline::after(Duration::MAX), None);
        assert!(timer(Deadline::after(Duration::MAX))
            .recv_timeout(Duration::from_millis(10))
            .is_err());
    }

    #[test]
    fn test_timer() {
        let start = Instant::now();
        let fired = timer(Deadline::after(Duration::from_millis(20)))
            .recv()
            .unwrap();
        assert!(fired.duration_since(start) >= Duration::from_millis(20));

        assert!(timer(None)
            .recv_timeout(Duration::from_millis(10))
            .is_err());
    }
}
