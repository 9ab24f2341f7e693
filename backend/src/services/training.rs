//! Training service: sessions, status lifecycle, participants and results

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{Pagination, PaginatedResponse, TrainingStatus};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Training service
#[derive(Clone)]
pub struct TrainingService {
    db: PgPool,
}

/// Training record with its course, coach and city resolved
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Training {
    pub id: Uuid,
    pub course_level_id: Uuid,
    pub course_id: Uuid,
    pub course_name: String,
    pub level_name: String,
    pub hours: Decimal,
    pub coach_id: Uuid,
    pub coach_name: String,
    pub city_id: Uuid,
    pub city_name: String,
    pub regional_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub location: Option<String>,
    pub status: TrainingStatus,
    pub notes: Option<String>,
    pub participant_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Participant of a training with the recorded result
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Participant {
    pub collaborator_id: Uuid,
    pub document_number: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub attendance_percent: Option<Decimal>,
    pub score: Option<Decimal>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub certificate_code: Option<String>,
}

/// Input for scheduling a training
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTrainingInput {
    pub course_level_id: Uuid,
    pub coach_id: Uuid,
    pub city_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Input for updating a training
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTrainingInput {
    pub coach_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
    pub notes: Option<String>,
}

/// Input for changing a training's status
#[derive(Debug, Deserialize)]
pub struct ChangeStatusInput {
    pub status: TrainingStatus,
}

/// Input for enrolling collaborators
#[derive(Debug, Deserialize)]
pub struct AddParticipantsInput {
    pub collaborator_ids: Vec<Uuid>,
}

/// Outcome of an enrollment request
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentResult {
    pub added: usize,
    pub already_enrolled: usize,
}

/// A single participant result
#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantResultInput {
    pub collaborator_id: Uuid,
    pub attendance_percent: Decimal,
    pub score: Decimal,
}

/// Input for recording results in bulk
#[derive(Debug, Deserialize)]
pub struct RecordResultsInput {
    pub results: Vec<ParticipantResultInput>,
}

/// Filters for listing trainings
#[derive(Debug, Default, Deserialize)]
pub struct TrainingFilter {
    pub status: Option<TrainingStatus>,
    pub course_id: Option<Uuid>,
    pub coach_id: Option<Uuid>,
    pub city_id: Option<Uuid>,
    pub regional_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

const TRAINING_SELECT: &str = r#"
    SELECT t.id, t.course_level_id, l.course_id, c.name AS course_name, l.name AS level_name,
           l.hours, t.coach_id, co.full_name AS coach_name, t.city_id, ci.name AS city_name,
           ci.regional_id, t.start_date, t.end_date, t.location, t.status, t.notes,
           (SELECT COUNT(*) FROM training_participants p WHERE p.training_id = t.id) AS participant_count,
           t.created_at, t.updated_at
    FROM trainings t
    JOIN course_levels l ON l.id = t.course_level_id
    JOIN courses c ON c.id = l.course_id
    JOIN coaches co ON co.id = t.coach_id
    JOIN cities ci ON ci.id = t.city_id
"#;

/// Check that a training's dates are ordered
pub fn validate_training_dates(start_date: NaiveDate, end_date: NaiveDate) -> AppResult<()> {
    if end_date < start_date {
        return Err(AppError::validation(
            "end_date",
            "End date cannot be before the start date",
            "La fecha de fin no puede ser anterior a la de inicio",
        ));
    }
    Ok(())
}

/// Check a training status change against the lifecycle
pub fn check_status_transition(current: TrainingStatus, next: TrainingStatus) -> AppResult<()> {
    if current.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "Training cannot move from {} to {}",
            current.as_str(),
            next.as_str()
        )))
    }
}

/// Validate every result row before anything is written
pub fn validate_results(results: &[ParticipantResultInput]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for result in results {
        if !seen.insert(result.collaborator_id) {
            return Err(AppError::Validation {
                field: "results".to_string(),
                message: format!(
                    "Collaborator {} appears more than once",
                    result.collaborator_id
                ),
                message_es: format!(
                    "El colaborador {} aparece más de una vez",
                    result.collaborator_id
                ),
            });
        }
        if shared::validate_percent(result.attendance_percent).is_err() {
            return Err(AppError::Validation {
                field: "attendance_percent".to_string(),
                message: format!(
                    "Attendance for collaborator {} must be between 0 and 100",
                    result.collaborator_id
                ),
                message_es: format!(
                    "La asistencia del colaborador {} debe estar entre 0 y 100",
                    result.collaborator_id
                ),
            });
        }
        if shared::validate_score(result.score).is_err() {
            return Err(AppError::Validation {
                field: "score".to_string(),
                message: format!(
                    "Score for collaborator {} must be between 0 and 20",
                    result.collaborator_id
                ),
                message_es: format!(
                    "La nota del colaborador {} debe estar entre 0 y 20",
                    result.collaborator_id
                ),
            });
        }
    }
    Ok(())
}

impl TrainingService {
    /// Create a new TrainingService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Trainings
    // ========================================================================

    /// Schedule a training
    pub async fn create_training(&self, input: CreateTrainingInput) -> AppResult<Training> {
        input.validate()?;
        validate_training_dates(input.start_date, input.end_date)?;

        self.ensure_references(Some(input.course_level_id), Some(input.coach_id), Some(input.city_id))
            .await?;

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO trainings (course_level_id, coach_id, city_id, start_date, end_date, location, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(input.course_level_id)
        .bind(input.coach_id)
        .bind(input.city_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.location)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(training_id = %id, "Training scheduled");
        self.get_training(id).await
    }

    /// Get a training by ID
    pub async fn get_training(&self, training_id: Uuid) -> AppResult<Training> {
        sqlx::query_as::<_, Training>(&format!(
            "{} WHERE t.id = $1 AND t.deleted_at IS NULL",
            TRAINING_SELECT
        ))
        .bind(training_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Training".to_string()))
    }

    /// List trainings with filters
    pub async fn list_trainings(
        &self,
        filter: TrainingFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Training>> {
        let where_clause = r#"
            WHERE t.deleted_at IS NULL
              AND ($1::VARCHAR IS NULL OR t.status = $1)
              AND ($2::UUID IS NULL OR l.course_id = $2)
              AND ($3::UUID IS NULL OR t.coach_id = $3)
              AND ($4::UUID IS NULL OR t.city_id = $4)
              AND ($5::UUID IS NULL OR ci.regional_id = $5)
              AND ($6::DATE IS NULL OR t.end_date >= $6)
              AND ($7::DATE IS NULL OR t.start_date <= $7)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*) FROM trainings t
               JOIN course_levels l ON l.id = t.course_level_id
               JOIN cities ci ON ci.id = t.city_id {}"#,
            where_clause
        ))
        .bind(filter.status)
        .bind(filter.course_id)
        .bind(filter.coach_id)
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_one(&self.db)
        .await?;

        let trainings = sqlx::query_as::<_, Training>(&format!(
            "{} {} ORDER BY t.start_date DESC LIMIT $8 OFFSET $9",
            TRAINING_SELECT, where_clause
        ))
        .bind(filter.status)
        .bind(filter.course_id)
        .bind(filter.coach_id)
        .bind(filter.city_id)
        .bind(filter.regional_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(trainings, &pagination, total.max(0) as u64))
    }

    /// Update an open training
    pub async fn update_training(
        &self,
        training_id: Uuid,
        input: UpdateTrainingInput,
    ) -> AppResult<Training> {
        input.validate()?;

        let current = self.get_training(training_id).await?;
        if !current.status.is_open() {
            return Err(AppError::InvalidStateTransition(format!(
                "A {} training cannot be edited",
                current.status.as_str()
            )));
        }

        validate_training_dates(
            input.start_date.unwrap_or(current.start_date),
            input.end_date.unwrap_or(current.end_date),
        )?;
        self.ensure_references(None, input.coach_id, input.city_id).await?;

        sqlx::query(
            r#"
            UPDATE trainings SET
                coach_id = COALESCE($2, coach_id),
                city_id = COALESCE($3, city_id),
                start_date = COALESCE($4, start_date),
                end_date = COALESCE($5, end_date),
                location = COALESCE($6, location),
                notes = COALESCE($7, notes),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(training_id)
        .bind(input.coach_id)
        .bind(input.city_id)
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(&input.location)
        .bind(&input.notes)
        .execute(&self.db)
        .await?;

        self.get_training(training_id).await
    }

    /// Soft-delete a training that has not issued certificates
    pub async fn delete_training(&self, training_id: Uuid) -> AppResult<()> {
        let _ = self.get_training(training_id).await?;

        let certificates: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM certificates WHERE training_id = $1")
                .bind(training_id)
                .fetch_one(&self.db)
                .await?;

        if certificates > 0 {
            return Err(AppError::conflict(
                "training",
                "Training has issued certificates",
                "La capacitación ya emitió certificados",
            ));
        }

        sqlx::query("UPDATE trainings SET deleted_at = NOW() WHERE id = $1")
            .bind(training_id)
            .execute(&self.db)
            .await?;

        tracing::info!(training_id = %training_id, "Training deleted");
        Ok(())
    }

    /// Move a training through its lifecycle
    pub async fn change_status(&self, training_id: Uuid, next: TrainingStatus) -> AppResult<Training> {
        let current = self.get_training(training_id).await?;
        check_status_transition(current.status, next)?;

        if next == TrainingStatus::Completed && current.participant_count == 0 {
            return Err(AppError::InvalidStateTransition(
                "A training without participants cannot be completed".to_string(),
            ));
        }

        // Guard against a concurrent status change
        let result = sqlx::query(
            "UPDATE trainings SET status = $2, updated_at = NOW() WHERE id = $1 AND status = $3",
        )
        .bind(training_id)
        .bind(next)
        .bind(current.status)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::conflict(
                "training",
                "Training status changed concurrently",
                "El estado de la capacitación cambió en paralelo",
            ));
        }

        tracing::info!(
            training_id = %training_id,
            from = current.status.as_str(),
            to = next.as_str(),
            "Training status changed"
        );
        self.get_training(training_id).await
    }

    // ========================================================================
    // Participants
    // ========================================================================

    /// List participants with their results
    pub async fn list_participants(&self, training_id: Uuid) -> AppResult<Vec<Participant>> {
        let _ = self.get_training(training_id).await?;

        let participants = sqlx::query_as::<_, Participant>(
            r#"
            SELECT p.collaborator_id, co.document_number, co.first_name, co.last_name,
                   co.is_active, p.attendance_percent, p.score, p.recorded_at,
                   (SELECT ce.code FROM certificates ce
                    WHERE ce.training_id = p.training_id
                      AND ce.collaborator_id = p.collaborator_id
                      AND ce.status = 'valid'
                    LIMIT 1) AS certificate_code
            FROM training_participants p
            JOIN collaborators co ON co.id = p.collaborator_id
            WHERE p.training_id = $1
            ORDER BY co.last_name ASC, co.first_name ASC
            "#,
        )
        .bind(training_id)
        .fetch_all(&self.db)
        .await?;

        Ok(participants)
    }

    /// Enroll collaborators. Already-enrolled collaborators are skipped.
    pub async fn add_participants(
        &self,
        training_id: Uuid,
        input: AddParticipantsInput,
    ) -> AppResult<EnrollmentResult> {
        let training = self.get_training(training_id).await?;
        if !training.status.allows_enrollment() {
            return Err(AppError::InvalidStateTransition(format!(
                "Participants cannot be enrolled in a {} training",
                training.status.as_str()
            )));
        }

        let mut ids = input.collaborator_ids;
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Err(AppError::validation(
                "collaborator_ids",
                "At least one collaborator is required",
                "Debe indicar al menos un colaborador",
            ));
        }

        let eligible: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM collaborators
            WHERE id = ANY($1) AND deleted_at IS NULL AND is_active = true
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        if let Some(rejected) = ids.iter().find(|id| !eligible.contains(id)) {
            return Err(AppError::Validation {
                field: "collaborator_ids".to_string(),
                message: format!("Collaborator {} is inactive or does not exist", rejected),
                message_es: format!("El colaborador {} está inactivo o no existe", rejected),
            });
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO training_participants (training_id, collaborator_id)
            SELECT $1, UNNEST($2::UUID[])
            ON CONFLICT (training_id, collaborator_id) DO NOTHING
            "#,
        )
        .bind(training_id)
        .bind(&ids)
        .execute(&self.db)
        .await?
        .rows_affected() as usize;

        tracing::info!(training_id = %training_id, added = inserted, "Participants enrolled");
        Ok(EnrollmentResult {
            added: inserted,
            already_enrolled: ids.len() - inserted,
        })
    }

    /// Remove a participant from a training that is not completed
    pub async fn remove_participant(&self, training_id: Uuid, collaborator_id: Uuid) -> AppResult<()> {
        let training = self.get_training(training_id).await?;
        if training.status == TrainingStatus::Completed {
            return Err(AppError::InvalidStateTransition(
                "Participants cannot be removed from a completed training".to_string(),
            ));
        }

        let result = sqlx::query(
            "DELETE FROM training_participants WHERE training_id = $1 AND collaborator_id = $2",
        )
        .bind(training_id)
        .bind(collaborator_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Participant".to_string()));
        }

        Ok(())
    }

    /// Record attendance and scores for enrolled participants
    pub async fn record_results(
        &self,
        training_id: Uuid,
        input: RecordResultsInput,
    ) -> AppResult<Vec<Participant>> {
        let training = self.get_training(training_id).await?;
        if !training.status.allows_results() {
            return Err(AppError::InvalidStateTransition(format!(
                "Results cannot be recorded for a {} training",
                training.status.as_str()
            )));
        }
        validate_results(&input.results)?;

        let mut tx = self.db.begin().await?;

        for result in &input.results {
            let updated = sqlx::query(
                r#"
                UPDATE training_participants
                SET attendance_percent = $3, score = $4, recorded_at = NOW()
                WHERE training_id = $1 AND collaborator_id = $2
                "#,
            )
            .bind(training_id)
            .bind(result.collaborator_id)
            .bind(result.attendance_percent)
            .bind(result.score)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(AppError::Validation {
                    field: "collaborator_id".to_string(),
                    message: format!(
                        "Collaborator {} is not enrolled in this training",
                        result.collaborator_id
                    ),
                    message_es: format!(
                        "El colaborador {} no está inscrito en esta capacitación",
                        result.collaborator_id
                    ),
                });
            }
        }

        tx.commit().await?;

        tracing::info!(
            training_id = %training_id,
            recorded = input.results.len(),
            "Training results recorded"
        );
        self.list_participants(training_id).await
    }

    /// Validate referenced level, coach and city are live
    async fn ensure_references(
        &self,
        course_level_id: Option<Uuid>,
        coach_id: Option<Uuid>,
        city_id: Option<Uuid>,
    ) -> AppResult<()> {
        if let Some(level_id) = course_level_id {
            let exists: bool = sqlx::query_scalar(
                r#"
                SELECT EXISTS(
                    SELECT 1 FROM course_levels l JOIN courses c ON c.id = l.course_id
                    WHERE l.id = $1 AND l.deleted_at IS NULL AND c.deleted_at IS NULL
                )
                "#,
            )
            .bind(level_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound("Course level".to_string()));
            }
        }

        if let Some(coach_id) = coach_id {
            let active: Option<bool> = sqlx::query_scalar(
                "SELECT is_active FROM coaches WHERE id = $1 AND deleted_at IS NULL",
            )
            .bind(coach_id)
            .fetch_optional(&self.db)
            .await?;
            match active {
                None => return Err(AppError::NotFound("Coach".to_string())),
                Some(false) => {
                    return Err(AppError::validation(
                        "coach_id",
                        "Coach is inactive",
                        "El instructor está inactivo",
                    ))
                }
                Some(true) => {}
            }
        }

        if let Some(city_id) = city_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM cities WHERE id = $1 AND deleted_at IS NULL)",
            )
            .bind(city_id)
            .fetch_one(&self.db)
            .await?;
            if !exists {
                return Err(AppError::NotFound("City".to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates_must_be_ordered() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
        assert!(validate_training_dates(start, end).is_err());
        assert!(validate_training_dates(start, start).is_ok());
    }

    #[test]
    fn test_completed_training_cannot_reopen() {
        assert!(matches!(
            check_status_transition(TrainingStatus::Completed, TrainingStatus::InProgress),
            Err(AppError::InvalidStateTransition(_))
        ));
        assert!(check_status_transition(TrainingStatus::Scheduled, TrainingStatus::InProgress).is_ok());
    }

    #[test]
    fn test_results_out_of_range_are_rejected() {
        let row = |attendance: i64, score: i64| ParticipantResultInput {
            collaborator_id: Uuid::new_v4(),
            attendance_percent: Decimal::from(attendance),
            score: Decimal::from(score),
        };
        assert!(validate_results(&[row(100, 20), row(0, 0)]).is_ok());
        assert!(validate_results(&[row(101, 15)]).is_err());
        assert!(validate_results(&[row(90, 21)]).is_err());
    }
}
