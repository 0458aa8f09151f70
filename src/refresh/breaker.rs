/// State change reported by [`FailureBreaker::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    /// The consecutive-failure limit was crossed
    RecoveryStarted,
    /// Enough successes arrived to close the recovery period
    RecoveryEnded,
}

/// One-sided circuit breaker over consecutive request failures.
///
/// The breaker never rejects or delays work. Crossing the failure
/// limit only opens a "recovery period" that is surfaced in logs and
/// counted in the run summary, as a signal that the upstream API was
/// unhappy for a stretch.
///
/// Rules:
/// - A success resets the consecutive-failure count to zero
/// - Failure number `fail_limit + 1` starts a recovery period, unless
///   one is already open
/// - Each success during recovery shrinks the remaining period by one;
///   at zero the period is over
/// - Failures during recovery do not extend it and cannot stack a
///   second period on top
#[derive(Debug)]
pub struct FailureBreaker {
    fail_limit: u32,
    recovery_period: u32,
    consecutive_failures: u32,
    recovery_remaining: u32,
    periods_started: u32,
}

impl FailureBreaker {
    pub fn new(fail_limit: u32, recovery_period: u32) -> Self {
        Self {
            fail_limit,
            recovery_period,
            consecutive_failures: 0,
            recovery_remaining: 0,
            periods_started: 0,
        }
    }

    /// Feeds one request outcome in; returns a transition when the
    /// breaker changed state.
    pub fn record(&mut self, success: bool) -> Option<BreakerTransition> {
        if success {
            self.consecutive_failures = 0;
            if self.recovery_remaining > 0 {
                self.recovery_remaining -= 1;
                if self.recovery_remaining == 0 {
                    return Some(BreakerTransition::RecoveryEnded);
                }
            }
            None
        } else {
            self.consecutive_failures += 1;
            if self.consecutive_failures > self.fail_limit && !self.in_recovery() {
                self.recovery_remaining = self.recovery_period;
                self.periods_started += 1;
                return Some(BreakerTransition::RecoveryStarted);
            }
            None
        }
    }

    pub fn in_recovery(&self) -> bool {
        self.recovery_remaining > 0
    }

    /// Recovery periods started since the breaker was created.
    pub fn periods_started(&self) -> u32 {
        self.periods_started
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_at_the_limit_do_not_open_recovery() {
        let mut breaker = FailureBreaker::new(3, 5);

        for _ in 0..3 {
            assert_eq!(breaker.record(false), None);
        }

        assert!(!breaker.in_recovery());
        assert_eq!(breaker.periods_started(), 0);
    }

    #[test]
    fn failure_beyond_the_limit_opens_recovery() {
        let mut breaker = FailureBreaker::new(3, 5);

        for _ in 0..3 {
            breaker.record(false);
        }
        assert_eq!(
            breaker.record(false),
            Some(BreakerTransition::RecoveryStarted)
        );

        assert!(breaker.in_recovery());
        assert_eq!(breaker.periods_started(), 1);
    }

    #[test]
    fn success_resets_the_consecutive_count() {
        let mut breaker = FailureBreaker::new(2, 5);

        breaker.record(false);
        breaker.record(false);
        breaker.record(true);

        // the count restarted, so two more failures stay under the limit
        assert_eq!(breaker.record(false), None);
        assert_eq!(breaker.record(false), None);
        assert!(!breaker.in_recovery());
    }

    #[test]
    fn successes_drain_the_recovery_period() {
        let mut breaker = FailureBreaker::new(0, 3);

        assert_eq!(
            breaker.record(false),
            Some(BreakerTransition::RecoveryStarted)
        );

        assert_eq!(breaker.record(true), None);
        assert_eq!(breaker.record(true), None);
        assert_eq!(breaker.record(true), Some(BreakerTransition::RecoveryEnded));
        assert!(!breaker.in_recovery());
    }

    #[test]
    fn failures_during_recovery_do_not_stack_periods() {
        let mut breaker = FailureBreaker::new(0, 2);

        assert_eq!(
            breaker.record(false),
            Some(BreakerTransition::RecoveryStarted)
        );
        for _ in 0..5 {
            assert_eq!(breaker.record(false), None);
        }

        assert_eq!(breaker.periods_started(), 1);
        assert!(breaker.in_recovery());
    }

    #[test]
    fn new_period_can_open_after_the_previous_closed() {
        let mut breaker = FailureBreaker::new(0, 1);

        assert_eq!(
            breaker.record(false),
            Some(BreakerTransition::RecoveryStarted)
        );
        assert_eq!(breaker.record(true), Some(BreakerTransition::RecoveryEnded));
        assert_eq!(
            breaker.record(false),
            Some(BreakerTransition::RecoveryStarted)
        );

        assert_eq!(breaker.periods_started(), 2);
    }
}
