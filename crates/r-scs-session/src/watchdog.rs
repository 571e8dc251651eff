//! ---
//! scs_section: "03-session-liveness"
//! scs_subsection: "module"
//! scs_type: "source"
//! scs_scope: "code"
//! scs_description: "Session registries, watchdogs, and liveness tracking."
//! scs_version: "v0.0.0-prealpha"
//! scs_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

/// Single-shot connection watchdog.
///
/// The deadline is observed, never waited on: the owning scheduler calls
/// [`Watchdog::poll`] at the top of each tick and reacts to the one `true`
/// it will ever get per expiry. Feeding re-arms the deadline.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Instant>,
    fired: bool,
}

impl Watchdog {
    /// Create an unarmed watchdog with the given timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
            fired: false,
        }
    }

    /// Push the deadline out to `now + timeout`, arming if necessary.
    pub fn feed(&mut self, now: Instant) {
        self.deadline = Some(now + self.timeout);
        self.fired = false;
    }

    /// Drop the deadline entirely.
    pub fn disarm(&mut self) {
        self.deadline = None;
        self.fired = false;
    }

    /// Whether a deadline is currently pending or has fired.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Observe the deadline. Returns `true` exactly once per expiry;
    /// idempotent afterwards until the next [`Watchdog::feed`].
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if !self.fired && now >= deadline => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_once_per_expiry() {
        let mut wd = Watchdog::new(Duration::from_secs(3));
        let start = Instant::now();
        wd.feed(start);

        assert!(!wd.poll(start + Duration::from_secs(2)));
        assert!(wd.poll(start + Duration::from_secs(3)));
        assert!(!wd.poll(start + Duration::from_secs(4)));
        assert!(!wd.poll(start + Duration::from_secs(60)));
    }

    #[test]
    fn feeding_before_expiry_prevents_the_timeout() {
        let mut wd = Watchdog::new(Duration::from_secs(3));
        let start = Instant::now();
        wd.feed(start);

        // fed at the last instant before the deadline
        let almost = start + Duration::from_millis(2950);
        assert!(!wd.poll(almost));
        wd.feed(almost);
        assert!(!wd.poll(start + Duration::from_secs(3)));
        assert!(wd.poll(almost + Duration::from_secs(3)));
    }

    #[test]
    fn unarmed_watchdog_never_fires() {
        let mut wd = Watchdog::new(Duration::from_millis(1));
        assert!(!wd.is_armed());
        assert_eq!(wd.timeout(), Duration::from_millis(1));
        assert!(!wd.poll(Instant::now() + Duration::from_secs(10)));

        wd.feed(Instant::now());
        assert!(wd.is_armed());
        wd.disarm();
        assert!(!wd.is_armed());
    }

    #[test]
    fn refeeding_after_expiry_rearms() {
        let mut wd = Watchdog::new(Duration::from_secs(1));
        let start = Instant::now();
        wd.feed(start);
        assert!(wd.poll(start + Duration::from_secs(1)));

        wd.feed(start + Duration::from_secs(2));
        assert!(!wd.poll(start + Duration::from_millis(2500)));
        assert!(wd.poll(start + Duration::from_secs(3)));
    }
}
