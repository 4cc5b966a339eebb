//! Heartbeat watchdog
//!
//! The heartbeat of the drive is the only sign of life on the bus. The watchdog remembers when
//! the last one arrived; a periodic check reports a failure whenever it is older than the
//! timeout.

use crate::config::WatchdogConfig;

/// Tracks the age of the last heartbeat
#[derive(Clone, Copy, Debug)]
pub struct Watchdog {
    timeout_us: u64,
    last_heartbeat_us: Option<u64>,
    alarm_active: bool,
}

impl Watchdog {
    /// Create a watchdog which has not seen a heartbeat yet
    ///
    /// It reports a failure on every check until the first heartbeat is fed.
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            timeout_us: config.timeout_ms as u64 * 1000,
            last_heartbeat_us: None,
            alarm_active: false,
        }
    }

    /// Record a heartbeat received at `now_us`
    pub fn feed(&mut self, now_us: u64) {
        self.last_heartbeat_us = Some(now_us);
    }

    /// Time of the last heartbeat
    pub fn last_heartbeat_us(&self) -> Option<u64> {
        self.last_heartbeat_us
    }

    /// True while the heartbeat is overdue
    pub fn alarm_active(&self) -> bool {
        self.alarm_active
    }

    /// Check the heartbeat age at `now_us`
    ///
    /// Returns true if the heartbeat is overdue. The condition is logged only when it appears and
    /// when it clears.
    pub fn check(&mut self, now_us: u64) -> bool {
        let age_us = self.last_heartbeat_us.map(|t| now_us.saturating_sub(t));
        let expired = match age_us {
            Some(age) => age > self.timeout_us,
            None => true,
        };

        if expired {
            if !self.alarm_active {
                match age_us {
                    Some(age) => log::error!(
                        "Last heartbeat was {:.2} s ago, only {:.2} s are allowed",
                        age as f64 / 1e6,
                        self.timeout_us as f64 / 1e6
                    ),
                    None => log::error!("No heartbeat received from the drive"),
                }
                self.alarm_active = true;
            }
        } else if self.alarm_active {
            log::info!("Heartbeat received again");
            self.alarm_active = false;
        }
        expired
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const S: u64 = 1_000_000;

    #[test]
    fn test_single_failure_then_recovery() {
        let mut wd = Watchdog::new(&WatchdogConfig::default());
        let t0 = 10 * S;
        wd.feed(t0);

        assert!(!wd.check(t0 + S));
        assert!(wd.check(t0 + 2 * S + S / 10));
        assert!(wd.alarm_active());

        // A heartbeat before the next check suppresses further failures
        wd.feed(t0 + 3 * S);
        assert!(!wd.check(t0 + 4 * S));
        assert!(!wd.alarm_active());
    }

    #[test]
    fn test_stale_before_first_heartbeat() {
        let mut wd = Watchdog::new(&WatchdogConfig::default());
        assert!(wd.check(0));
        assert!(wd.check(3 * S));
        assert_eq!(None, wd.last_heartbeat_us());
    }

    #[test]
    fn test_exact_timeout_is_not_a_failure() {
        let mut wd = Watchdog::new(&WatchdogConfig {
            timeout_ms: 500,
            period_ms: 1000,
        });
        wd.feed(0);
        assert!(!wd.check(S / 2));
        assert!(wd.check(S / 2 + 1));
    }
}
