use std::time::{Duration, Instant};

/// Exponential backoff between request attempts.
///
/// Delays start at 500ms and grow by a factor of 1.5 up to a 2s cap. The
/// generator never sleeps past the caller's deadline: when the next delay
/// would overrun it, iteration stops.
#[derive(Debug)]
pub(crate) struct Backoff {
    next: Duration,
}

const INITIAL_INTERVAL: Duration = Duration::from_millis(500);
const MAX_INTERVAL: Duration = Duration::from_secs(2);

impl Backoff {
    pub(crate) fn new() -> Self {
        Self {
            next: INITIAL_INTERVAL,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.next = INITIAL_INTERVAL;
    }

    /// The delay to wait before the next attempt, or `None` if waiting that
    /// long would pass the deadline.
    pub(crate) fn next_delay(&mut self, deadline: Instant) -> Option<Duration> {
        let delay = self.next;
        self.next = (self.next.mul_f64(1.5)).min(MAX_INTERVAL);

        let now = Instant::now();
        if now >= deadline || deadline - now <= delay {
            return None;
        }
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_to_cap() {
        let mut b = Backoff::new();
        let far = Instant::now() + Duration::from_secs(3600);

        let d1 = b.next_delay(far).expect("first delay");
        let d2 = b.next_delay(far).expect("second delay");
        let d3 = b.next_delay(far).expect("third delay");

        assert_eq!(d1, Duration::from_millis(500));
        assert_eq!(d2, Duration::from_millis(750));
        assert_eq!(d3, Duration::from_millis(1125));

        for _ in 0..10 {
            b.next_delay(far);
        }
        assert_eq!(b.next_delay(far), Some(MAX_INTERVAL));
    }

    #[test]
    fn stops_at_deadline() {
        let mut b = Backoff::new();
        let near = Instant::now() + Duration::from_millis(100);
        assert_eq!(b.next_delay(near), None);
    }

    #[test]
    fn reset_restarts_sequence() {
        let mut b = Backoff::new();
        let far = Instant::now() + Duration::from_secs(3600);
        b.next_delay(far);
        b.next_delay(far);
        b.reset();
        assert_eq!(b.next_delay(far), Some(Duration::from_millis(500)));
    }
}
