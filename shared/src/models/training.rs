//! Training models

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Lifecycle of a training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TrainingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl TrainingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStatus::Scheduled => "scheduled",
            TrainingStatus::InProgress => "in_progress",
            TrainingStatus::Completed => "completed",
            TrainingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "scheduled" => Ok(TrainingStatus::Scheduled),
            "in_progress" => Ok(TrainingStatus::InProgress),
            "completed" => Ok(TrainingStatus::Completed),
            "cancelled" => Ok(TrainingStatus::Cancelled),
            _ => Err(ParseEnumError::new("training status", s)),
        }
    }

    pub fn display_name_es(&self) -> &'static str {
        match self {
            TrainingStatus::Scheduled => "Programada",
            TrainingStatus::InProgress => "En curso",
            TrainingStatus::Completed => "Finalizada",
            TrainingStatus::Cancelled => "Cancelada",
        }
    }

    /// scheduled -> in_progress -> completed, and any open state -> cancelled
    pub fn can_transition_to(&self, next: TrainingStatus) -> bool {
        matches!(
            (self, next),
            (TrainingStatus::Scheduled, TrainingStatus::InProgress)
                | (TrainingStatus::InProgress, TrainingStatus::Completed)
                | (TrainingStatus::Scheduled, TrainingStatus::Cancelled)
                | (TrainingStatus::InProgress, TrainingStatus::Cancelled)
        )
    }

    /// Participants can be enrolled or removed
    pub fn allows_enrollment(&self) -> bool {
        matches!(self, TrainingStatus::Scheduled | TrainingStatus::InProgress)
    }

    /// Attendance and scores can be recorded
    pub fn allows_results(&self) -> bool {
        matches!(self, TrainingStatus::InProgress | TrainingStatus::Completed)
    }

    /// Holds the coach's agenda
    pub fn is_open(&self) -> bool {
        matches!(self, TrainingStatus::Scheduled | TrainingStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [TrainingStatus; 4] = [
        TrainingStatus::Scheduled,
        TrainingStatus::InProgress,
        TrainingStatus::Completed,
        TrainingStatus::Cancelled,
    ];

    #[test]
    fn test_forward_transitions() {
        assert!(TrainingStatus::Scheduled.can_transition_to(TrainingStatus::InProgress));
        assert!(TrainingStatus::InProgress.can_transition_to(TrainingStatus::Completed));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for next in ALL {
            assert!(!TrainingStatus::Completed.can_transition_to(next));
            assert!(!TrainingStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn test_cannot_skip_in_progress() {
        assert!(!TrainingStatus::Scheduled.can_transition_to(TrainingStatus::Completed));
    }

    #[test]
    fn test_status_names_round_trip() {
        for status in ALL {
            assert_eq!(TrainingStatus::parse(status.as_str()), Ok(status));
        }
    }
}
