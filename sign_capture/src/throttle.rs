use std::time::Duration;
use tokio::time::Instant;

/// Allows one action per window. The window starts when the action is taken
/// and closes on its own, whatever the action is still doing.
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    until: Option<Instant>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            until: None,
        }
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.until.is_some_and(|until| now < until)
    }

    /// Opens a new window and returns `true` unless one is still running.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if self.is_active(now) {
            return false;
        }
        self.until = Some(now + self.period);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_acquire_per_window() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_millis(300));

        assert!(cooldown.try_acquire(start));
        assert!(cooldown.is_active(start));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(1)));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(299)));
        assert!(cooldown.try_acquire(start + Duration::from_millis(300)));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(599)));
    }

    #[test]
    fn test_window_restarts_from_acquire_time() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_millis(300));

        assert!(cooldown.try_acquire(start));
        assert!(cooldown.try_acquire(start + Duration::from_millis(1000)));
        assert!(!cooldown.try_acquire(start + Duration::from_millis(1299)));
        assert!(!cooldown.is_active(start + Duration::from_millis(1300)));
    }
}
