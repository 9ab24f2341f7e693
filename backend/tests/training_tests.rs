//! Training lifecycle tests
//!
//! Status state machine, date rules and result validation.

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::TrainingStatus;
use sst_training_backend::error::AppError;
use sst_training_backend::services::training::{
    check_status_transition, validate_results, validate_training_dates, ParticipantResultInput,
};
use uuid::Uuid;

fn status_strategy() -> impl Strategy<Value = TrainingStatus> {
    prop_oneof![
        Just(TrainingStatus::Scheduled),
        Just(TrainingStatus::InProgress),
        Just(TrainingStatus::Completed),
        Just(TrainingStatus::Cancelled),
    ]
}

fn result(attendance: Decimal, score: Decimal) -> ParticipantResultInput {
    ParticipantResultInput {
        collaborator_id: Uuid::new_v4(),
        attendance_percent: attendance,
        score,
    }
}

#[test]
fn test_lifecycle_happy_path() {
    assert!(check_status_transition(TrainingStatus::Scheduled, TrainingStatus::InProgress).is_ok());
    assert!(check_status_transition(TrainingStatus::InProgress, TrainingStatus::Completed).is_ok());
}

#[test]
fn test_cannot_skip_or_reopen() {
    for (from, to) in [
        (TrainingStatus::Scheduled, TrainingStatus::Completed),
        (TrainingStatus::Completed, TrainingStatus::InProgress),
        (TrainingStatus::Completed, TrainingStatus::Cancelled),
        (TrainingStatus::Cancelled, TrainingStatus::Scheduled),
    ] {
        assert!(
            matches!(check_status_transition(from, to), Err(AppError::InvalidStateTransition(_))),
            "{:?} -> {:?} should be rejected",
            from,
            to
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Terminal states accept no transition, and no state moves to itself
    #[test]
    fn prop_terminal_states_are_final(from in status_strategy(), to in status_strategy()) {
        let allowed = check_status_transition(from, to).is_ok();
        if matches!(from, TrainingStatus::Completed | TrainingStatus::Cancelled) || from == to {
            prop_assert!(!allowed);
        }
        prop_assert_eq!(allowed, from.can_transition_to(to));
    }

    /// Only open trainings take enrollments
    #[test]
    fn prop_enrollment_only_while_open(status in status_strategy()) {
        prop_assert_eq!(
            status.allows_enrollment(),
            matches!(status, TrainingStatus::Scheduled | TrainingStatus::InProgress)
        );
    }
}

#[test]
fn test_training_dates() {
    let start = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
    assert!(validate_training_dates(start, start).is_ok());
    assert!(validate_training_dates(start, start.succ_opt().unwrap()).is_ok());
    assert!(matches!(
        validate_training_dates(start, start.pred_opt().unwrap()),
        Err(AppError::Validation { ref field, .. }) if field == "end_date"
    ));
}

#[test]
fn test_results_range_checks() {
    assert!(validate_results(&[
        result(Decimal::from(100), Decimal::from(20)),
        result(Decimal::ZERO, Decimal::ZERO),
        result(Decimal::new(875, 1), Decimal::new(145, 1)),
    ])
    .is_ok());

    assert!(matches!(
        validate_results(&[result(Decimal::from(101), Decimal::from(15))]),
        Err(AppError::Validation { ref field, .. }) if field == "attendance_percent"
    ));
    assert!(matches!(
        validate_results(&[result(Decimal::from(90), Decimal::new(205, 1))]),
        Err(AppError::Validation { ref field, .. }) if field == "score"
    ));
}

#[test]
fn test_duplicate_results_are_rejected() {
    let first = result(Decimal::from(90), Decimal::from(15));
    let mut second = result(Decimal::from(80), Decimal::from(16));
    second.collaborator_id = first.collaborator_id;
    assert!(validate_results(&[first, second]).is_err());
}
