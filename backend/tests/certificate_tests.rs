//! Certificate issuance tests
//!
//! Property-based and unit tests for:
//! - Verification code generation and format
//! - Certificate expiry arithmetic
//! - Participant eligibility during mass issuance
//! - Concurrent issuance and revocation against a live database (ignored)

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    certificate_expiry, expiration_alert_threshold, validate_certificate_code_format,
    CertificateState, CertificateStatus, ExistingCertificate, HeldDocument, IneligibilityReason,
    TrainingStatus,
};
use sst_training_backend::error::AppError;
use sst_training_backend::services::certificate::{
    assess_participants, generate_certificate_code, verify_certificate_code, IssuanceContext,
    IssueCertificatesInput, ParticipantSnapshot, RevokeCertificateInput,
};
use sst_training_backend::services::CertificateService;
use sqlx::PgPool;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn context(status: TrainingStatus, required: &[&str]) -> IssuanceContext {
    IssuanceContext {
        training_id: Uuid::new_v4(),
        status,
        course_level_id: Uuid::new_v4(),
        course_min_score: Decimal::from(14),
        level_min_score: None,
        min_attendance_percent: Decimal::from(80),
        validity_months: Some(12),
        required_document_types: required.iter().map(|s| s.to_string()).collect(),
    }
}

fn participant(attendance: Option<i64>, score: Option<i64>) -> ParticipantSnapshot {
    ParticipantSnapshot {
        collaborator_id: Uuid::new_v4(),
        first_name: "Rosa".to_string(),
        last_name: "Quispe".to_string(),
        is_active: true,
        attendance_percent: attendance.map(Decimal::from),
        score: score.map(Decimal::from),
    }
}

// ============================================================================
// Verification codes
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Codes are reproducible from the secret and the certificate id
    #[test]
    fn prop_code_is_deterministic(bytes in any::<[u8; 16]>(), year in 2000i32..2100) {
        let id = Uuid::from_bytes(bytes);
        let first = generate_certificate_code("signing-secret", id, year);
        let second = generate_certificate_code("signing-secret", id, year);
        prop_assert_eq!(&first, &second);
        prop_assert!(verify_certificate_code("signing-secret", id, &first));
    }

    /// Every generated code passes the public format check
    #[test]
    fn prop_code_matches_format(bytes in any::<[u8; 16]>(), year in 2000i32..2100) {
        let code = generate_certificate_code("signing-secret", Uuid::from_bytes(bytes), year);
        prop_assert!(validate_certificate_code_format(&code).is_ok(), "bad code {}", code);
        let expected_prefix = format!("SST-{}-", year);
        prop_assert!(code.starts_with(&expected_prefix));
    }

    /// A code minted with another secret does not verify
    #[test]
    fn prop_code_depends_on_secret(bytes in any::<[u8; 16]>()) {
        let id = Uuid::from_bytes(bytes);
        let code = generate_certificate_code("secret-a", id, 2024);
        prop_assert!(!verify_certificate_code("secret-b", id, &code));
    }
}

#[test]
fn test_code_verification_ignores_case_and_whitespace() {
    let id = Uuid::new_v4();
    let code = generate_certificate_code("signing-secret", id, 2024);
    let sloppy = format!("  {}  ", code.to_lowercase());
    assert!(verify_certificate_code("signing-secret", id, &sloppy));
    assert!(!verify_certificate_code("signing-secret", Uuid::new_v4(), &code));
}

// ============================================================================
// Expiry
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Longer validity never expires earlier
    #[test]
    fn prop_expiry_is_monotone(day in 0u32..3650, months in 1i32..120) {
        let issued_on = date(2020, 1, 1) + chrono::Duration::days(day as i64);
        let shorter = certificate_expiry(issued_on, Some(months)).unwrap();
        let longer = certificate_expiry(issued_on, Some(months + 1)).unwrap();
        prop_assert!(longer > shorter);
        prop_assert!(shorter > issued_on);
    }
}

#[test]
fn test_expiry_edge_cases() {
    assert_eq!(certificate_expiry(date(2024, 1, 31), Some(1)), Some(date(2024, 2, 29)));
    assert_eq!(certificate_expiry(date(2023, 8, 31), Some(6)), Some(date(2024, 2, 29)));
    assert_eq!(certificate_expiry(date(2024, 1, 31), None), None);
    assert_eq!(certificate_expiry(date(2024, 1, 31), Some(0)), None);
}

#[test]
fn test_certificate_state_on_expiry_day() {
    let expiry = date(2025, 3, 10);
    assert_eq!(
        CertificateState::evaluate(CertificateStatus::Valid, Some(expiry), expiry),
        CertificateState::Valid
    );
    assert_eq!(
        CertificateState::evaluate(CertificateStatus::Valid, Some(expiry), date(2025, 3, 11)),
        CertificateState::Expired
    );
    assert_eq!(
        CertificateState::evaluate(CertificateStatus::Revoked, None, expiry),
        CertificateState::Revoked
    );
}

#[test]
fn test_expiration_alert_thresholds() {
    assert_eq!(expiration_alert_threshold(70), None);
    assert_eq!(expiration_alert_threshold(60), Some(60));
    assert_eq!(expiration_alert_threshold(31), Some(60));
    assert_eq!(expiration_alert_threshold(30), Some(30));
    assert_eq!(expiration_alert_threshold(0), Some(15));
    assert_eq!(expiration_alert_threshold(-1), None);
}

// ============================================================================
// Eligibility
// ============================================================================

#[test]
fn test_mass_issuance_separates_eligible_and_skipped() {
    let ctx = context(TrainingStatus::Completed, &[]);
    let participants = vec![
        participant(Some(100), Some(18)),
        participant(Some(50), Some(18)),
        participant(Some(90), Some(10)),
        participant(None, None),
    ];

    let results = assess_participants(
        &ctx,
        date(2024, 5, 1),
        &participants,
        &HashMap::new(),
        &HashMap::new(),
    );

    let eligible: Vec<_> = results.iter().filter(|(_, e)| e.is_eligible()).collect();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].0.collaborator_id, participants[0].collaborator_id);

    assert!(matches!(
        results[1].1.reasons(),
        [IneligibilityReason::AttendanceBelowMinimum { .. }]
    ));
    assert!(matches!(
        results[2].1.reasons(),
        [IneligibilityReason::ScoreBelowMinimum { .. }]
    ));
    assert_eq!(results[3].1.reasons(), &[IneligibilityReason::ResultNotRecorded]);
}

#[test]
fn test_all_reasons_are_collected() {
    let ctx = context(TrainingStatus::InProgress, &["medical_exam"]);
    let mut inactive = participant(Some(10), Some(5));
    inactive.is_active = false;
    let participants = vec![inactive];

    let existing = HashMap::from([(
        participants[0].collaborator_id,
        vec![ExistingCertificate {
            code: "SST-2024-ABCDEFGH".to_string(),
            status: CertificateStatus::Valid,
            expires_on: None,
        }],
    )]);

    let results = assess_participants(&ctx, date(2024, 5, 1), &participants, &HashMap::new(), &existing);
    let reasons = results[0].1.reasons();

    assert_eq!(reasons.len(), 6);
    assert_eq!(reasons[0], IneligibilityReason::TrainingNotCompleted);
    assert_eq!(reasons[1], IneligibilityReason::CollaboratorInactive);
    assert!(reasons
        .iter()
        .any(|r| matches!(r, IneligibilityReason::MissingDocuments { document_types } if document_types == &vec!["medical_exam".to_string()])));
    assert!(reasons
        .iter()
        .any(|r| matches!(r, IneligibilityReason::AlreadyCertified { .. })));
}

#[test]
fn test_expired_documents_do_not_count() {
    let ctx = context(TrainingStatus::Completed, &["medical_exam"]);
    let participants = vec![participant(Some(100), Some(20)), participant(Some(100), Some(20))];

    let documents = HashMap::from([
        (
            participants[0].collaborator_id,
            vec![HeldDocument {
                document_type: "medical_exam".to_string(),
                expires_on: Some(date(2024, 4, 30)),
            }],
        ),
        (
            participants[1].collaborator_id,
            vec![HeldDocument {
                document_type: "medical_exam".to_string(),
                expires_on: Some(date(2024, 5, 1)),
            }],
        ),
    ]);

    let results = assess_participants(&ctx, date(2024, 5, 1), &participants, &documents, &HashMap::new());
    assert!(!results[0].1.is_eligible());
    assert!(results[1].1.is_eligible());
}

#[test]
fn test_expired_or_revoked_certificates_allow_reissue() {
    let ctx = context(TrainingStatus::Completed, &[]);
    let participants = vec![participant(Some(100), Some(20))];
    let existing = HashMap::from([(
        participants[0].collaborator_id,
        vec![
            ExistingCertificate {
                code: "SST-2022-AAAAAAAA".to_string(),
                status: CertificateStatus::Valid,
                expires_on: Some(date(2023, 1, 1)),
            },
            ExistingCertificate {
                code: "SST-2023-BBBBBBBB".to_string(),
                status: CertificateStatus::Revoked,
                expires_on: None,
            },
        ],
    )]);

    let results = assess_participants(&ctx, date(2024, 5, 1), &participants, &HashMap::new(), &existing);
    assert!(results[0].1.is_eligible());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A participant is eligible exactly when there are no reasons
    #[test]
    fn prop_eligible_iff_no_reasons(attendance in 0i64..=100, score in 0i64..=20) {
        let ctx = context(TrainingStatus::Completed, &[]);
        let participants = vec![participant(Some(attendance), Some(score))];
        let results = assess_participants(&ctx, date(2024, 5, 1), &participants, &HashMap::new(), &HashMap::new());
        let eligibility = &results[0].1;

        prop_assert_eq!(eligibility.is_eligible(), eligibility.reasons().is_empty());
        prop_assert_eq!(eligibility.is_eligible(), attendance >= 80 && score >= 14);
    }
}

// ============================================================================
// Database-bound
// ============================================================================

/// Ids seeded for one collaborator enrolled in two completed trainings of
/// the same course level, passing both
struct Seed {
    user_id: Uuid,
    collaborator_id: Uuid,
    trainings: [Uuid; 2],
}

async fn seed_two_trainings(pool: &PgPool) -> Seed {
    let tag = Uuid::new_v4().simple().to_string();
    let user_id: Uuid = sqlx::query_scalar(
        "INSERT INTO users (email, password_hash, full_name, role) \
         VALUES ($1, 'x', 'Coordinadora', 'coordinator') RETURNING id",
    )
    .bind(format!("{}@example.com", tag))
    .fetch_one(pool)
    .await
    .unwrap();
    let regional_id: Uuid =
        sqlx::query_scalar("INSERT INTO regionals (name) VALUES ($1) RETURNING id")
            .bind(format!("Regional {}", tag))
            .fetch_one(pool)
            .await
            .unwrap();
    let city_id: Uuid =
        sqlx::query_scalar("INSERT INTO cities (regional_id, name) VALUES ($1, 'Arequipa') RETURNING id")
            .bind(regional_id)
            .fetch_one(pool)
            .await
            .unwrap();
    let coach_id: Uuid = sqlx::query_scalar(
        "INSERT INTO coaches (document_number, full_name) VALUES ($1, 'Luis Rojas') RETURNING id",
    )
    .bind(&tag[..20])
    .fetch_one(pool)
    .await
    .unwrap();
    let course_id: Uuid = sqlx::query_scalar(
        "INSERT INTO courses (code, name, validity_months) VALUES ($1, 'Trabajos en altura', 12) RETURNING id",
    )
    .bind(&tag[..30])
    .fetch_one(pool)
    .await
    .unwrap();
    let level_id: Uuid = sqlx::query_scalar(
        "INSERT INTO course_levels (course_id, name, level_order, hours) \
         VALUES ($1, 'Básico', 1, 8) RETURNING id",
    )
    .bind(course_id)
    .fetch_one(pool)
    .await
    .unwrap();
    let collaborator_id: Uuid = sqlx::query_scalar(
        "INSERT INTO collaborators (document_type, document_number, first_name, last_name, city_id) \
         VALUES ('passport', $1, 'Rosa', 'Quispe', $2) RETURNING id",
    )
    .bind(&tag[..20])
    .bind(city_id)
    .fetch_one(pool)
    .await
    .unwrap();

    let mut trainings = [Uuid::nil(); 2];
    for training in trainings.iter_mut() {
        *training = sqlx::query_scalar(
            "INSERT INTO trainings (course_level_id, coach_id, city_id, start_date, end_date, status) \
             VALUES ($1, $2, $3, '2024-05-02', '2024-05-03', 'completed') RETURNING id",
        )
        .bind(level_id)
        .bind(coach_id)
        .bind(city_id)
        .fetch_one(pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO training_participants (training_id, collaborator_id, attendance_percent, score) \
             VALUES ($1, $2, 100, 18)",
        )
        .bind(*training)
        .bind(collaborator_id)
        .execute(pool)
        .await
        .unwrap();
    }

    Seed {
        user_id,
        collaborator_id,
        trainings,
    }
}

#[tokio::test]
#[ignore] // Requires database connection and SST_ configuration
async fn test_concurrent_issuance_for_one_level_issues_once() {
    let config = sst_training_backend::Config::load().expect("configuration must load");
    let pool = PgPool::connect(&config.database.url).await.unwrap();
    let seed = seed_two_trainings(&pool).await;
    let service = CertificateService::new(pool.clone(), config.certificates.clone());
    let input = || IssueCertificatesInput {
        issued_on: Some(date(2024, 5, 10)),
    };

    let (first, second) = tokio::join!(
        service.issue_for_training(seed.trainings[0], seed.user_id, input()),
        service.issue_for_training(seed.trainings[1], seed.user_id, input()),
    );
    let first = first.unwrap();
    let second = second.unwrap();
    assert_eq!(first.issued_count + second.issued_count, 1);
    assert_eq!(first.skipped_count + second.skipped_count, 1);

    let valid: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM certificates WHERE collaborator_id = $1 AND status = 'valid'",
    )
    .bind(seed.collaborator_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(valid, 1);
}

#[tokio::test]
#[ignore] // Requires database connection and SST_ configuration
async fn test_second_revocation_is_rejected() {
    let config = sst_training_backend::Config::load().expect("configuration must load");
    let pool = PgPool::connect(&config.database.url).await.unwrap();
    let seed = seed_two_trainings(&pool).await;
    let service = CertificateService::new(pool, config.certificates.clone());

    let report = service
        .issue_for_training(
            seed.trainings[0],
            seed.user_id,
            IssueCertificatesInput {
                issued_on: Some(date(2024, 5, 10)),
            },
        )
        .await
        .unwrap();
    let certificate_id = report.issued[0].certificate_id;
    let revoke = || RevokeCertificateInput {
        reason: "Datos del participante incorrectos".to_string(),
    };

    let revoked = service.revoke(certificate_id, seed.user_id, revoke()).await.unwrap();
    assert_eq!(revoked.record.status, CertificateStatus::Revoked);

    let again = service.revoke(certificate_id, seed.user_id, revoke()).await;
    assert!(matches!(again, Err(AppError::InvalidStateTransition(_))));

    let missing = service.revoke(Uuid::new_v4(), seed.user_id, revoke()).await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));
}
