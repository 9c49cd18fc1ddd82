//! Account lockout policy.
//!
//! A pure function of the stored counters and the current time. The caller
//! reads the user, asks [`LockoutPolicy::evaluate_login`] whether an attempt
//! may proceed, verifies the password, then persists the
//! [`CounterUpdate`] returned by [`LockoutPolicy::record_outcome`].

use chrono::{DateTime, Duration, Utc};

use crate::config::LockoutConfig;
use crate::domain::UserStatus;

/// Snapshot of the lockout-relevant columns of a user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginState {
    pub status: UserStatus,
    pub failed_login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    Allowed,
    Locked { remaining_minutes: i64 },
    Inactive,
}

/// Column values to write back after an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterUpdate {
    pub failed_login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub last_failed_login: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub update: CounterUpdate,
    /// This attempt crossed the threshold and started a lock.
    pub newly_locked: bool,
    /// Attempts left before lockout, only set when the warning window applies.
    pub remaining_attempts: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct LockoutPolicy {
    max_failed_attempts: u32,
    lock_duration: Duration,
    warn_when_remaining: u32,
}

impl LockoutPolicy {
    #[must_use]
    pub const fn new(max_failed_attempts: u32, lock_duration: Duration, warn_when_remaining: u32) -> Self {
        Self {
            max_failed_attempts,
            lock_duration,
            warn_when_remaining,
        }
    }

    #[must_use]
    pub fn from_config(config: &LockoutConfig) -> Self {
        Self::new(
            config.max_failed_attempts,
            Duration::minutes(config.lock_minutes),
            config.warn_when_remaining,
        )
    }

    #[must_use]
    pub const fn max_failed_attempts(&self) -> u32 {
        self.max_failed_attempts
    }

    /// An active lock wins over the inactive status so that a locked account
    /// always reports its countdown.
    #[must_use]
    pub fn evaluate_login(&self, state: &LoginState, now: DateTime<Utc>) -> LoginDecision {
        if let Some(lock_until) = state.lock_until
            && lock_until > now
        {
            return LoginDecision::Locked {
                remaining_minutes: remaining_minutes(lock_until, now),
            };
        }

        if state.status != UserStatus::Active {
            return LoginDecision::Inactive;
        }

        LoginDecision::Allowed
    }

    #[must_use]
    pub fn record_outcome(&self, state: &LoginState, success: bool, now: DateTime<Utc>) -> AttemptOutcome {
        if success {
            return AttemptOutcome {
                update: CounterUpdate {
                    failed_login_attempts: 0,
                    lock_until: None,
                    last_failed_login: None,
                    last_login: Some(now),
                },
                newly_locked: false,
                remaining_attempts: None,
            };
        }

        // A lock that has run out starts a fresh series.
        let lock_expired = state.lock_until.is_some_and(|until| until <= now);
        let previous = if lock_expired {
            0
        } else {
            state.failed_login_attempts
        };
        let attempts = previous.saturating_add(1);
        let newly_locked = attempts >= self.max_failed_attempts;

        let remaining = self.max_failed_attempts.saturating_sub(attempts);
        let remaining_attempts =
            (remaining >= 1 && remaining <= self.warn_when_remaining).then_some(remaining);

        AttemptOutcome {
            update: CounterUpdate {
                failed_login_attempts: attempts,
                lock_until: newly_locked.then(|| now + self.lock_duration),
                last_failed_login: Some(now),
                last_login: None,
            },
            newly_locked,
            remaining_attempts,
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::from_config(&LockoutConfig::default())
    }
}

/// Whole minutes left on a lock, rounded up.
fn remaining_minutes(lock_until: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (lock_until - now).num_milliseconds().max(0);
    (millis + 59_999) / 60_000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(attempts: u32, lock_until: Option<DateTime<Utc>>) -> LoginState {
        LoginState {
            status: UserStatus::Active,
            failed_login_attempts: attempts,
            lock_until,
        }
    }

    #[test]
    fn test_wrong_password_below_threshold_increments_by_one() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        for attempts in 0..4 {
            let outcome = policy.record_outcome(&state(attempts, None), false, now);
            assert_eq!(outcome.update.failed_login_attempts, attempts + 1);
            assert_eq!(outcome.update.lock_until, None);
            assert!(!outcome.newly_locked);
            assert_eq!(outcome.update.last_failed_login, Some(now));
        }
    }

    #[test]
    fn test_fifth_failure_locks_for_thirty_minutes() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        let outcome = policy.record_outcome(&state(4, None), false, now);
        assert_eq!(outcome.update.failed_login_attempts, 5);
        assert_eq!(outcome.update.lock_until, Some(now + Duration::minutes(30)));
        assert!(outcome.newly_locked);
        assert_eq!(outcome.remaining_attempts, None);
    }

    #[test]
    fn test_remaining_attempts_hint_only_near_lockout() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        let hints: Vec<Option<u32>> = (0..5)
            .map(|a| policy.record_outcome(&state(a, None), false, now).remaining_attempts)
            .collect();

        assert_eq!(hints, vec![None, None, Some(2), Some(1), None]);
    }

    #[test]
    fn test_active_lock_denies_with_rounded_up_minutes() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let lock_until = now + Duration::minutes(12) + Duration::seconds(1);

        assert_eq!(
            policy.evaluate_login(&state(5, Some(lock_until)), now),
            LoginDecision::Locked {
                remaining_minutes: 13
            }
        );
    }

    #[test]
    fn test_expired_lock_allows_and_restarts_count() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let expired = state(5, Some(now - Duration::seconds(1)));

        assert_eq!(policy.evaluate_login(&expired, now), LoginDecision::Allowed);

        let outcome = policy.record_outcome(&expired, false, now);
        assert_eq!(outcome.update.failed_login_attempts, 1);
        assert!(!outcome.newly_locked);
    }

    #[test]
    fn test_inactive_user_is_denied() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();
        let mut inactive = state(0, None);
        inactive.status = UserStatus::Inactive;

        assert_eq!(policy.evaluate_login(&inactive, now), LoginDecision::Inactive);
    }

    #[test]
    fn test_success_resets_everything() {
        let policy = LockoutPolicy::default();
        let now = Utc::now();

        let outcome = policy.record_outcome(&state(3, Some(now - Duration::hours(1))), true, now);
        assert_eq!(
            outcome.update,
            CounterUpdate {
                failed_login_attempts: 0,
                lock_until: None,
                last_failed_login: None,
                last_login: Some(now),
            }
        );
    }
}
