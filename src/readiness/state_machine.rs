//! State machine for a single readiness check
//!
//! A check starts `Pending`, moves to `Polling` on its first attempt and
//! ends in exactly one of two terminal states: `Converged` when the
//! readiness predicate held, `Exhausted` when the retry budget ran out.

use std::fmt;

/// Lifecycle phase of one readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckPhase {
    /// No attempt made yet
    Pending,
    /// Attempts in flight, budget not yet spent
    Polling,
    /// Readiness predicate held
    Converged,
    /// Budget spent without the predicate holding
    Exhausted,
}

impl CheckPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CheckPhase::Converged | CheckPhase::Exhausted)
    }

    /// Apply an event, rejecting transitions the table does not allow
    pub fn transition(self, event: CheckEvent) -> Result<CheckPhase, InvalidTransition> {
        TRANSITIONS
            .iter()
            .find(|t| t.from == self && t.event == event)
            .map(|t| t.to)
            .ok_or(InvalidTransition {
                current: self,
                event,
            })
    }

    /// Events accepted in this phase
    pub fn valid_events(&self) -> Vec<CheckEvent> {
        TRANSITIONS
            .iter()
            .filter(|t| t.from == *self)
            .map(|t| t.event)
            .collect()
    }
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckPhase::Pending => write!(f, "Pending"),
            CheckPhase::Polling => write!(f, "Polling"),
            CheckPhase::Converged => write!(f, "Converged"),
            CheckPhase::Exhausted => write!(f, "Exhausted"),
        }
    }
}

/// Events that move a check between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckEvent {
    /// An attempt is about to be made
    AttemptStarted,
    /// The readiness predicate held on this attempt
    PredicateHeld,
    /// The attempt failed or the predicate did not hold, and budget remains
    PredicateFailed,
    /// The attempt failed or the predicate did not hold on the last attempt
    BudgetSpent,
}

impl fmt::Display for CheckEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckEvent::AttemptStarted => write!(f, "AttemptStarted"),
            CheckEvent::PredicateHeld => write!(f, "PredicateHeld"),
            CheckEvent::PredicateFailed => write!(f, "PredicateFailed"),
            CheckEvent::BudgetSpent => write!(f, "BudgetSpent"),
        }
    }
}

/// Event not accepted in the current phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub current: CheckPhase,
    pub event: CheckEvent,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "event {} is not valid in phase {}",
            self.event, self.current
        )
    }
}

impl std::error::Error for InvalidTransition {}

struct Transition {
    from: CheckPhase,
    event: CheckEvent,
    to: CheckPhase,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        from: CheckPhase::Pending,
        event: CheckEvent::AttemptStarted,
        to: CheckPhase::Polling,
    },
    // Polling stays Polling while retries remain; the next attempt
    // re-enters through AttemptStarted.
    Transition {
        from: CheckPhase::Polling,
        event: CheckEvent::AttemptStarted,
        to: CheckPhase::Polling,
    },
    Transition {
        from: CheckPhase::Polling,
        event: CheckEvent::PredicateFailed,
        to: CheckPhase::Polling,
    },
    Transition {
        from: CheckPhase::Polling,
        event: CheckEvent::PredicateHeld,
        to: CheckPhase::Converged,
    },
    Transition {
        from: CheckPhase::Polling,
        event: CheckEvent::BudgetSpent,
        to: CheckPhase::Exhausted,
    },
];
