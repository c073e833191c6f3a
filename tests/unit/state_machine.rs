//! Unit tests for readiness check phase transitions

use cluster_smoke::readiness::{CheckEvent, CheckPhase};

const ALL_EVENTS: [CheckEvent; 4] = [
    CheckEvent::AttemptStarted,
    CheckEvent::PredicateHeld,
    CheckEvent::PredicateFailed,
    CheckEvent::BudgetSpent,
];

mod transition_tests {
    use super::*;

    #[test]
    fn test_pending_only_starts_an_attempt() {
        assert_eq!(
            CheckPhase::Pending.transition(CheckEvent::AttemptStarted),
            Ok(CheckPhase::Polling)
        );
        assert_eq!(
            CheckPhase::Pending.valid_events(),
            vec![CheckEvent::AttemptStarted]
        );
    }

    #[test]
    fn test_pending_cannot_converge_without_an_attempt() {
        let err = CheckPhase::Pending
            .transition(CheckEvent::PredicateHeld)
            .unwrap_err();
        assert_eq!(err.current, CheckPhase::Pending);
        assert_eq!(err.event, CheckEvent::PredicateHeld);
        assert_eq!(
            err.to_string(),
            "event PredicateHeld is not valid in phase Pending"
        );
    }

    #[test]
    fn test_polling_retries_stay_polling() {
        let phase = CheckPhase::Polling
            .transition(CheckEvent::PredicateFailed)
            .unwrap()
            .transition(CheckEvent::AttemptStarted)
            .unwrap();
        assert_eq!(phase, CheckPhase::Polling);
    }

    #[test]
    fn test_polling_terminal_events() {
        assert_eq!(
            CheckPhase::Polling.transition(CheckEvent::PredicateHeld),
            Ok(CheckPhase::Converged)
        );
        assert_eq!(
            CheckPhase::Polling.transition(CheckEvent::BudgetSpent),
            Ok(CheckPhase::Exhausted)
        );
    }

    #[test]
    fn test_terminal_phases_reject_every_event() {
        for phase in [CheckPhase::Converged, CheckPhase::Exhausted] {
            assert!(phase.is_terminal());
            for event in ALL_EVENTS {
                assert!(
                    phase.transition(event).is_err(),
                    "{} accepted {}",
                    phase,
                    event
                );
            }
        }
    }

    #[test]
    fn test_full_retry_walk() {
        let events = [
            CheckEvent::AttemptStarted,
            CheckEvent::PredicateFailed,
            CheckEvent::AttemptStarted,
            CheckEvent::PredicateFailed,
            CheckEvent::AttemptStarted,
            CheckEvent::BudgetSpent,
        ];
        let phase = events
            .iter()
            .try_fold(CheckPhase::Pending, |phase, event| phase.transition(*event))
            .unwrap();
        assert_eq!(phase, CheckPhase::Exhausted);
    }
}
