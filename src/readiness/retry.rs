//! Bounded retry for readiness polling
//!
//! Every readiness check shares one shape: make an attempt, and if the
//! predicate does not hold yet, wait and try again until the attempt budget
//! is spent. [`poll_until`] is that shape. The attempt closure receives a
//! [`RetryState`] describing where it is in the budget and answers with a
//! [`PollOutcome`]; the loop owns sleeping, logging and the
//! [`CheckPhase`](super::state_machine::CheckPhase) bookkeeping.
//!
//! ```ignore
//! let policy = RetryPolicy::default();
//! let outcome = poll_until(&policy, "list of all Pods", "returned", |_| async {
//!     match api.list_pods().await {
//!         Ok(pods) => PollOutcome::Ready(pods),
//!         Err(_) => PollOutcome::NotReady(None),
//!     }
//! })
//! .await;
//! ```

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info};

use super::state_machine::{CheckEvent, CheckPhase};

/// Attempts per check when nothing else is configured
pub const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// Wait between attempts when nothing else is configured
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// How the wait between attempts grows
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// Same interval before every retry
    Fixed,
    /// Interval multiplied after each retry, capped at `max_interval`
    Exponential {
        multiplier: f64,
        max_interval: Duration,
    },
    /// Interval grown by `step` after each retry, capped at `max_interval`
    Linear {
        step: Duration,
        max_interval: Duration,
    },
}

/// Retry budget and pacing for a single check
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Wait before the first retry
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    /// Fixed-interval policy
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Same pacing, with as many attempts as start before `deadline` has elapsed
    ///
    /// The first attempt is always made. A zero delay cannot make progress
    /// towards the deadline, so the budget stops growing there.
    pub fn within(&self, deadline: Duration) -> Self {
        let mut attempts = 1;
        let mut elapsed = Duration::ZERO;
        while elapsed < deadline && attempts < u32::MAX {
            let delay = self.delay_after(attempts);
            if delay.is_zero() {
                break;
            }
            elapsed = elapsed.saturating_add(delay);
            attempts += 1;
        }
        Self {
            max_attempts: attempts,
            ..self.clone()
        }
    }

    /// Upper bound on time spent sleeping for one check
    ///
    /// Saturates at [`Duration::MAX`].
    pub fn max_wait(&self) -> Duration {
        (1..self.max_attempts)
            .map(|n| self.delay_after(n))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Delay to sleep after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                multiplier,
                max_interval,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.interval.as_secs_f64() * multiplier.powi(exponent);
                if secs.is_nan() || secs >= max_interval.as_secs_f64() {
                    return max_interval;
                }
                Duration::from_secs_f64(secs.max(0.0))
            }
            Backoff::Linear { step, max_interval } => step
                .saturating_mul(attempt.saturating_sub(1))
                .saturating_add(self.interval)
                .min(max_interval),
        }
    }
}

/// Position of one poll within its budget
///
/// Each check threads its own value through the loop, so no counter is
/// shared between items.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
}

impl RetryState {
    /// State for the first attempt of a budget
    pub fn first(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts: max_attempts.max(1),
        }
    }

    /// 1-based number of the current attempt
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts left after the current one
    pub fn remaining(&self) -> u32 {
        self.max_attempts - self.attempt
    }

    pub fn is_last(&self) -> bool {
        self.remaining() == 0
    }

    /// State for the next attempt, or `None` once the budget is spent
    pub fn next(self) -> Option<Self> {
        (!self.is_last()).then(|| Self {
            attempt: self.attempt + 1,
            ..self
        })
    }
}

/// Answer from a single attempt
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    /// Readiness predicate holds
    Ready(T),
    /// Not there yet; carries whatever was observed, if anything
    NotReady(Option<T>),
}

/// Terminal result of a poll
#[derive(Debug, Clone, PartialEq)]
pub enum Convergence<T> {
    Converged { value: T, attempts: u32 },
    /// Budget spent; `last` is the most recent observation, if any attempt produced one
    Exhausted { last: Option<T>, attempts: u32 },
}

impl<T> Convergence<T> {
    pub fn is_converged(&self) -> bool {
        matches!(self, Convergence::Converged { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Convergence::Converged { attempts, .. } | Convergence::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Converged value, or the last observation on exhaustion
    pub fn into_observed(self) -> Option<T> {
        match self {
            Convergence::Converged { value, .. } => Some(value),
            Convergence::Exhausted { last, .. } => last,
        }
    }
}

/// Poll until `attempt` reports ready or the policy's budget is spent.
///
/// `what` and `status` only feed the log line emitted before every wait:
/// `Waiting for {what} to be {status}. Retrying...`
pub async fn poll_until<T, F, Fut>(
    policy: &RetryPolicy,
    what: &str,
    status: &str,
    mut attempt: F,
) -> Convergence<T>
where
    F: FnMut(RetryState) -> Fut,
    Fut: Future<Output = PollOutcome<T>>,
{
    let mut phase = CheckPhase::Pending;
    let mut state = RetryState::first(policy.max_attempts);
    let mut last = None;

    loop {
        advance(&mut phase, CheckEvent::AttemptStarted, what);

        match attempt(state).await {
            PollOutcome::Ready(value) => {
                advance(&mut phase, CheckEvent::PredicateHeld, what);
                debug!(what, attempts = state.attempt(), "Converged");
                return Convergence::Converged {
                    value,
                    attempts: state.attempt(),
                };
            }
            PollOutcome::NotReady(observed) => {
                if observed.is_some() {
                    last = observed;
                }

                match state.next() {
                    Some(next) => {
                        advance(&mut phase, CheckEvent::PredicateFailed, what);
                        info!("Waiting for {} to be {}. Retrying...", what, status);
                        tokio::time::sleep(policy.delay_after(state.attempt())).await;
                        state = next;
                    }
                    None => {
                        advance(&mut phase, CheckEvent::BudgetSpent, what);
                        debug!(what, attempts = state.attempt(), "Retry budget exhausted");
                        return Convergence::Exhausted {
                            last,
                            attempts: state.attempt(),
                        };
                    }
                }
            }
        }
    }
}

fn advance(phase: &mut CheckPhase, event: CheckEvent, what: &str) {
    match phase.transition(event) {
        Ok(next) => *phase = next,
        Err(e) => error!(what, error = %e, "Invalid readiness check transition"),
    }
}
