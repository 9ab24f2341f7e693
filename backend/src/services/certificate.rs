//! Certificate service: issuance, verification codes, revocation and lookup

use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shared::{
    certificate_display_name, certificate_expiry, evaluate_eligibility, expiration_alert_threshold,
    mask_document_number, normalize_certificate_code, validate_certificate_code_format,
    ApprovalThresholds, CertificateState, CertificateStatus, DocumentKind, Eligibility,
    EligibilityCheck, ExistingCertificate, HeldDocument, IneligibilityReason, Pagination,
    PaginatedResponse, TrainingStatus, CERTIFICATE_CODE_ALPHABET, CERTIFICATE_CODE_PREFIX,
    CERTIFICATE_CODE_SUFFIX_LEN,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::CertificateConfig;
use crate::documents::{format_date, verification_url, CertificateDocument, CertificateRenderer};
use crate::error::{field_error, AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// Certificate codes
// ============================================================================

/// Derive the public code of a certificate.
///
/// The suffix is the HMAC-SHA256 of the certificate id, keyed with the
/// signing secret, with each of the first bytes mapped onto the code
/// alphabet. Only the holder of the secret can produce a matching code.
pub fn generate_certificate_code(secret: &str, certificate_id: Uuid, year: i32) -> String {
    let suffix: String = code_digest(secret, certificate_id)
        .iter()
        .take(CERTIFICATE_CODE_SUFFIX_LEN)
        .map(|b| CERTIFICATE_CODE_ALPHABET[usize::from(*b) % CERTIFICATE_CODE_ALPHABET.len()] as char)
        .collect();
    format!("{}-{:04}-{}", CERTIFICATE_CODE_PREFIX, year, suffix)
}

/// Check that a code was produced for this certificate with this secret
pub fn verify_certificate_code(secret: &str, certificate_id: Uuid, code: &str) -> bool {
    let code = normalize_certificate_code(code);
    let Some(year) = code
        .split('-')
        .nth(1)
        .and_then(|y| y.parse::<i32>().ok())
    else {
        return false;
    };
    generate_certificate_code(secret, certificate_id, year) == code
}

fn code_digest(secret: &str, certificate_id: Uuid) -> Vec<u8> {
    // HMAC accepts keys of any length, so construction cannot fail
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(certificate_id.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

// ============================================================================
// Records
// ============================================================================

/// Certificate service
#[derive(Clone)]
pub struct CertificateService {
    db: PgPool,
    config: CertificateConfig,
}

/// Certificate row with collaborator, course and training details
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CertificateRecord {
    pub id: Uuid,
    pub code: String,
    pub collaborator_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub document_type: DocumentKind,
    pub document_number: String,
    pub training_id: Uuid,
    pub course_level_id: Uuid,
    pub course_id: Uuid,
    pub course_name: String,
    pub level_name: String,
    pub hours: Decimal,
    pub score: Option<Decimal>,
    pub coach_name: String,
    pub coach_signature_url: Option<String>,
    pub city_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub status: CertificateStatus,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub issued_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Certificate with its state evaluated for today
#[derive(Debug, Clone, Serialize)]
pub struct Certificate {
    #[serde(flatten)]
    pub record: CertificateRecord,
    pub state: CertificateState,
}

impl Certificate {
    fn from_record(record: CertificateRecord, today: NaiveDate) -> Self {
        let state = CertificateState::evaluate(record.status, record.expires_on, today);
        Self { record, state }
    }
}

/// Redacted certificate shown on the public verification page
#[derive(Debug, Clone, Serialize)]
pub struct PublicCertificate {
    pub code: String,
    pub collaborator_name: String,
    pub document_number: String,
    pub course_name: String,
    pub level_name: String,
    pub hours: Decimal,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
    pub state: CertificateState,
    pub state_label: String,
    pub signature_valid: bool,
}

/// Certificate that expires soon
#[derive(Debug, Clone, Serialize)]
pub struct ExpiringCertificate {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub days_until_expiration: i64,
    pub alert_threshold_days: Option<i64>,
}

/// Summary of a certificate issued in a batch
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCertificate {
    pub certificate_id: Uuid,
    pub code: String,
    pub collaborator_id: Uuid,
    pub collaborator_name: String,
    pub issued_on: NaiveDate,
    pub expires_on: Option<NaiveDate>,
}

/// Participant left without a certificate and the reasons why
#[derive(Debug, Clone, Serialize)]
pub struct SkippedParticipant {
    pub collaborator_id: Uuid,
    pub collaborator_name: String,
    pub reasons: Vec<IneligibilityReason>,
}

/// Outcome of issuing certificates for a training
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceReport {
    pub training_id: Uuid,
    pub issued_count: usize,
    pub skipped_count: usize,
    pub issued: Vec<IssuedCertificate>,
    pub skipped: Vec<SkippedParticipant>,
}

/// Input for issuing certificates
#[derive(Debug, Default, Deserialize)]
pub struct IssueCertificatesInput {
    /// Defaults to today
    pub issued_on: Option<NaiveDate>,
}

/// Input for revoking a certificate
#[derive(Debug, Deserialize)]
pub struct RevokeCertificateInput {
    pub reason: String,
}

/// Filters for listing certificates
#[derive(Debug, Default, Deserialize)]
pub struct CertificateFilter {
    pub collaborator_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub training_id: Option<Uuid>,
    pub state: Option<CertificateState>,
    pub search: Option<String>,
}

const CERTIFICATE_SELECT: &str = r#"
    SELECT ce.id, ce.code, ce.collaborator_id, co.first_name, co.last_name,
           co.document_type, co.document_number, ce.training_id, ce.course_level_id,
           l.course_id, c.name AS course_name, l.name AS level_name, l.hours, p.score,
           ch.full_name AS coach_name, ch.signature_url AS coach_signature_url,
           ci.name AS city_name, t.start_date, t.end_date, ce.issued_on, ce.expires_on,
           ce.status, ce.revoked_at, ce.revoked_reason, ce.issued_by, ce.created_at
    FROM certificates ce
    JOIN collaborators co ON co.id = ce.collaborator_id
    JOIN trainings t ON t.id = ce.training_id
    JOIN course_levels l ON l.id = ce.course_level_id
    JOIN courses c ON c.id = l.course_id
    JOIN coaches ch ON ch.id = t.coach_id
    JOIN cities ci ON ci.id = t.city_id
    LEFT JOIN training_participants p
           ON p.training_id = ce.training_id AND p.collaborator_id = ce.collaborator_id
"#;

// ============================================================================
// Issuance planning
// ============================================================================

/// Training facts that decide issuance
#[derive(Debug, Clone, FromRow)]
pub struct IssuanceContext {
    pub training_id: Uuid,
    pub status: TrainingStatus,
    pub course_level_id: Uuid,
    pub course_min_score: Decimal,
    pub level_min_score: Option<Decimal>,
    pub min_attendance_percent: Decimal,
    pub validity_months: Option<i32>,
    pub required_document_types: Vec<String>,
}

/// Participant facts that decide issuance
#[derive(Debug, Clone, FromRow)]
pub struct ParticipantSnapshot {
    pub collaborator_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub attendance_percent: Option<Decimal>,
    pub score: Option<Decimal>,
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    collaborator_id: Uuid,
    document_type: String,
    expires_on: Option<NaiveDate>,
}

#[derive(Debug, FromRow)]
struct ExistingRow {
    collaborator_id: Uuid,
    code: String,
    status: CertificateStatus,
    expires_on: Option<NaiveDate>,
}

/// Evaluate every participant against the training's rules, in order
pub fn assess_participants<'a>(
    context: &IssuanceContext,
    issue_date: NaiveDate,
    participants: &'a [ParticipantSnapshot],
    documents: &HashMap<Uuid, Vec<HeldDocument>>,
    existing: &HashMap<Uuid, Vec<ExistingCertificate>>,
) -> Vec<(&'a ParticipantSnapshot, Eligibility)> {
    let thresholds = ApprovalThresholds::for_level(
        context.course_min_score,
        context.level_min_score,
        context.min_attendance_percent,
    );

    participants
        .iter()
        .map(|participant| {
            let check = EligibilityCheck {
                issue_date,
                training_status: context.status,
                collaborator_active: participant.is_active,
                attendance_percent: participant.attendance_percent,
                score: participant.score,
                thresholds: &thresholds,
                required_documents: &context.required_document_types,
                documents_on_file: documents
                    .get(&participant.collaborator_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
                existing_certificates: existing
                    .get(&participant.collaborator_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            };
            (participant, evaluate_eligibility(&check))
        })
        .collect()
}

impl CertificateService {
    /// Create a new CertificateService instance
    pub fn new(db: PgPool, config: CertificateConfig) -> Self {
        Self { db, config }
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Issue certificates to every eligible participant of a training
    pub async fn issue_for_training(
        &self,
        training_id: Uuid,
        issued_by: Uuid,
        input: IssueCertificatesInput,
    ) -> AppResult<IssuanceReport> {
        let issued_on = input.issued_on.unwrap_or_else(|| Utc::now().date_naive());
        let report = self.issue(training_id, None, issued_on, issued_by).await?;

        tracing::info!(
            training_id = %training_id,
            issued = report.issued_count,
            skipped = report.skipped_count,
            "Certificates issued for training"
        );
        for skipped in &report.skipped {
            tracing::warn!(
                training_id = %training_id,
                collaborator_id = %skipped.collaborator_id,
                reasons = skipped.reasons.len(),
                "Participant not certified"
            );
        }

        Ok(report)
    }

    /// Issue a certificate to one participant. Ineligibility is an error.
    pub async fn issue_single(
        &self,
        training_id: Uuid,
        collaborator_id: Uuid,
        issued_by: Uuid,
        input: IssueCertificatesInput,
    ) -> AppResult<IssuedCertificate> {
        let issued_on = input.issued_on.unwrap_or_else(|| Utc::now().date_naive());
        let mut report = self
            .issue(training_id, Some(collaborator_id), issued_on, issued_by)
            .await?;

        if let Some(skipped) = report.skipped.pop() {
            return Err(AppError::NotEligible {
                reasons: skipped.reasons,
            });
        }

        let issued = report
            .issued
            .pop()
            .ok_or_else(|| AppError::NotFound("Participant".to_string()))?;

        tracing::info!(
            training_id = %training_id,
            collaborator_id = %collaborator_id,
            code = %issued.code,
            "Certificate issued"
        );
        Ok(issued)
    }

    async fn issue(
        &self,
        training_id: Uuid,
        only: Option<Uuid>,
        issued_on: NaiveDate,
        issued_by: Uuid,
    ) -> AppResult<IssuanceReport> {
        let mut tx = self.db.begin().await?;

        // Serialize issuance per training
        let context = sqlx::query_as::<_, IssuanceContext>(
            r#"
            SELECT t.id AS training_id, t.status, t.course_level_id,
                   c.min_score AS course_min_score, l.min_score AS level_min_score,
                   c.min_attendance_percent, c.validity_months, c.required_document_types
            FROM trainings t
            JOIN course_levels l ON l.id = t.course_level_id
            JOIN courses c ON c.id = l.course_id
            WHERE t.id = $1 AND t.deleted_at IS NULL
            FOR UPDATE OF t
            "#,
        )
        .bind(training_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Training".to_string()))?;

        let participants = sqlx::query_as::<_, ParticipantSnapshot>(
            r#"
            SELECT p.collaborator_id, co.first_name, co.last_name,
                   (co.is_active AND co.deleted_at IS NULL) AS is_active,
                   p.attendance_percent, p.score
            FROM training_participants p
            JOIN collaborators co ON co.id = p.collaborator_id
            WHERE p.training_id = $1
              AND ($2::UUID IS NULL OR p.collaborator_id = $2)
            ORDER BY co.last_name ASC, co.first_name ASC
            "#,
        )
        .bind(training_id)
        .bind(only)
        .fetch_all(&mut *tx)
        .await?;

        if only.is_some() && participants.is_empty() {
            return Err(AppError::NotFound("Participant".to_string()));
        }

        // Trainings of the same level issue the same certificates; serialize
        // them so one valid certificate per collaborator and level holds.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::UUID::TEXT, 0))")
            .bind(context.course_level_id)
            .execute(&mut *tx)
            .await?;

        let ids: Vec<Uuid> = participants.iter().map(|p| p.collaborator_id).collect();
        let documents = Self::load_documents(&mut tx, &ids).await?;
        let existing = Self::load_existing(&mut tx, &ids, context.course_level_id).await?;

        let expires_on = certificate_expiry(issued_on, context.validity_months);
        let assessments = assess_participants(&context, issued_on, &participants, &documents, &existing);

        let mut issued = Vec::new();
        let mut skipped = Vec::new();

        for (participant, eligibility) in assessments {
            let collaborator_name =
                certificate_display_name(&participant.first_name, &participant.last_name);

            match eligibility {
                Eligibility::Eligible => {
                    let certificate_id = Uuid::new_v4();
                    let code = generate_certificate_code(
                        &self.config.signing_secret,
                        certificate_id,
                        issued_on.year(),
                    );

                    sqlx::query(
                        r#"
                        INSERT INTO certificates (
                            id, code, collaborator_id, training_id, course_level_id,
                            issued_on, expires_on, status, issued_by
                        )
                        VALUES ($1, $2, $3, $4, $5, $6, $7, 'valid', $8)
                        "#,
                    )
                    .bind(certificate_id)
                    .bind(&code)
                    .bind(participant.collaborator_id)
                    .bind(training_id)
                    .bind(context.course_level_id)
                    .bind(issued_on)
                    .bind(expires_on)
                    .bind(issued_by)
                    .execute(&mut *tx)
                    .await?;

                    issued.push(IssuedCertificate {
                        certificate_id,
                        code,
                        collaborator_id: participant.collaborator_id,
                        collaborator_name,
                        issued_on,
                        expires_on,
                    });
                }
                Eligibility::Ineligible(reasons) => skipped.push(SkippedParticipant {
                    collaborator_id: participant.collaborator_id,
                    collaborator_name,
                    reasons,
                }),
            }
        }

        tx.commit().await?;

        Ok(IssuanceReport {
            training_id,
            issued_count: issued.len(),
            skipped_count: skipped.len(),
            issued,
            skipped,
        })
    }

    async fn load_documents(
        tx: &mut Transaction<'_, Postgres>,
        collaborator_ids: &[Uuid],
    ) -> AppResult<HashMap<Uuid, Vec<HeldDocument>>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT collaborator_id, document_type, expires_on
            FROM collaborator_documents
            WHERE collaborator_id = ANY($1)
            "#,
        )
        .bind(collaborator_ids)
        .fetch_all(&mut **tx)
        .await?;

        let mut documents: HashMap<Uuid, Vec<HeldDocument>> = HashMap::new();
        for row in rows {
            documents
                .entry(row.collaborator_id)
                .or_default()
                .push(HeldDocument {
                    document_type: row.document_type,
                    expires_on: row.expires_on,
                });
        }
        Ok(documents)
    }

    async fn load_existing(
        tx: &mut Transaction<'_, Postgres>,
        collaborator_ids: &[Uuid],
        course_level_id: Uuid,
    ) -> AppResult<HashMap<Uuid, Vec<ExistingCertificate>>> {
        let rows = sqlx::query_as::<_, ExistingRow>(
            r#"
            SELECT collaborator_id, code, status, expires_on
            FROM certificates
            WHERE collaborator_id = ANY($1) AND course_level_id = $2
            "#,
        )
        .bind(collaborator_ids)
        .bind(course_level_id)
        .fetch_all(&mut **tx)
        .await?;

        let mut existing: HashMap<Uuid, Vec<ExistingCertificate>> = HashMap::new();
        for row in rows {
            existing
                .entry(row.collaborator_id)
                .or_default()
                .push(ExistingCertificate {
                    code: row.code,
                    status: row.status,
                    expires_on: row.expires_on,
                });
        }
        Ok(existing)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Get a certificate by ID
    pub async fn get_certificate(&self, certificate_id: Uuid) -> AppResult<Certificate> {
        let record = sqlx::query_as::<_, CertificateRecord>(&format!(
            "{} WHERE ce.id = $1",
            CERTIFICATE_SELECT
        ))
        .bind(certificate_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate".to_string()))?;

        Ok(Certificate::from_record(record, Utc::now().date_naive()))
    }

    /// List certificates with filters; `state` is evaluated as of today
    pub async fn list_certificates(
        &self,
        filter: CertificateFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Certificate>> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));
        let state = filter.state.map(|s| s.as_str());

        let where_clause = r#"
            WHERE ($1::UUID IS NULL OR ce.collaborator_id = $1)
              AND ($2::UUID IS NULL OR l.course_id = $2)
              AND ($3::UUID IS NULL OR ce.training_id = $3)
              AND ($4::VARCHAR IS NULL
                   OR ($4 = 'revoked' AND ce.status = 'revoked')
                   OR ($4 = 'expired' AND ce.status = 'valid' AND ce.expires_on < CURRENT_DATE)
                   OR ($4 = 'valid' AND ce.status = 'valid'
                       AND (ce.expires_on IS NULL OR ce.expires_on >= CURRENT_DATE)))
              AND ($5::VARCHAR IS NULL
                   OR ce.code ILIKE $5
                   OR co.document_number ILIKE $5
                   OR (co.first_name || ' ' || co.last_name) ILIKE $5)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            r#"SELECT COUNT(*) FROM certificates ce
               JOIN collaborators co ON co.id = ce.collaborator_id
               JOIN course_levels l ON l.id = ce.course_level_id {}"#,
            where_clause
        ))
        .bind(filter.collaborator_id)
        .bind(filter.course_id)
        .bind(filter.training_id)
        .bind(state)
        .bind(&search)
        .fetch_one(&self.db)
        .await?;

        let records = sqlx::query_as::<_, CertificateRecord>(&format!(
            "{} {} ORDER BY ce.issued_on DESC, ce.code ASC LIMIT $6 OFFSET $7",
            CERTIFICATE_SELECT, where_clause
        ))
        .bind(filter.collaborator_id)
        .bind(filter.course_id)
        .bind(filter.training_id)
        .bind(state)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        let certificates = records
            .into_iter()
            .map(|r| Certificate::from_record(r, today))
            .collect();

        Ok(PaginatedResponse::new(certificates, &pagination, total.max(0) as u64))
    }

    /// All certificates held by a collaborator
    pub async fn list_for_collaborator(&self, collaborator_id: Uuid) -> AppResult<Vec<Certificate>> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM collaborators WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(collaborator_id)
        .fetch_one(&self.db)
        .await?;
        if !exists {
            return Err(AppError::NotFound("Collaborator".to_string()));
        }

        let records = sqlx::query_as::<_, CertificateRecord>(&format!(
            "{} WHERE ce.collaborator_id = $1 ORDER BY ce.issued_on DESC",
            CERTIFICATE_SELECT
        ))
        .bind(collaborator_id)
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        Ok(records
            .into_iter()
            .map(|r| Certificate::from_record(r, today))
            .collect())
    }

    /// Valid certificates expiring within `days` days
    pub async fn list_expiring(&self, days: i64) -> AppResult<Vec<ExpiringCertificate>> {
        if !(1..=365).contains(&days) {
            return Err(AppError::validation(
                "days",
                "Days must be between 1 and 365",
                "Los días deben estar entre 1 y 365",
            ));
        }

        let records = sqlx::query_as::<_, CertificateRecord>(&format!(
            r#"{}
            WHERE ce.status = 'valid'
              AND ce.expires_on >= CURRENT_DATE
              AND ce.expires_on <= CURRENT_DATE + $1::INTEGER
              AND co.deleted_at IS NULL
            ORDER BY ce.expires_on ASC"#,
            CERTIFICATE_SELECT
        ))
        .bind(days as i32)
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        Ok(records
            .into_iter()
            .map(|record| {
                let days_until = record
                    .expires_on
                    .map(|expiry| (expiry - today).num_days())
                    .unwrap_or_default();
                ExpiringCertificate {
                    certificate: Certificate::from_record(record, today),
                    days_until_expiration: days_until,
                    alert_threshold_days: expiration_alert_threshold(days_until),
                }
            })
            .collect())
    }

    /// Revoke a certificate
    pub async fn revoke(
        &self,
        certificate_id: Uuid,
        revoked_by: Uuid,
        input: RevokeCertificateInput,
    ) -> AppResult<Certificate> {
        let reason = input.reason.trim();
        shared::validate_required(reason).map_err(field_error("reason"))?;

        let result = sqlx::query(
            r#"
            UPDATE certificates
            SET status = 'revoked', revoked_at = NOW(), revoked_reason = $2
            WHERE id = $1 AND status = 'valid'
            "#,
        )
        .bind(certificate_id)
        .bind(reason)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_certificate(certificate_id).await?;
            return Err(AppError::InvalidStateTransition(format!(
                "Certificate {} is already revoked",
                current.record.code
            )));
        }

        tracing::info!(
            certificate_id = %certificate_id,
            revoked_by = %revoked_by,
            "Certificate revoked"
        );
        self.get_certificate(certificate_id).await
    }

    /// Render the printable document of a certificate
    pub async fn render_document(&self, certificate_id: Uuid) -> AppResult<String> {
        let certificate = self.get_certificate(certificate_id).await?;
        let record = &certificate.record;

        let document = CertificateDocument {
            issuer_name: self.config.issuer_name.clone(),
            code: record.code.clone(),
            collaborator_name: certificate_display_name(&record.first_name, &record.last_name),
            document_type: record.document_type.as_str().to_uppercase(),
            document_number: record.document_number.clone(),
            course_name: record.course_name.clone(),
            level_name: Some(record.level_name.clone()),
            hours: record.hours.normalize().to_string(),
            score: record.score.map(|s| s.normalize().to_string()),
            city_name: record.city_name.clone(),
            start_date: format_date(record.start_date),
            end_date: format_date(record.end_date),
            issued_on: format_date(record.issued_on),
            expires_on: record.expires_on.map(format_date),
            coach_name: record.coach_name.clone(),
            coach_signature_url: record.coach_signature_url.clone(),
            verification_url: verification_url(&self.config.verification_base_url, &record.code),
            state: certificate.state.as_str().to_string(),
        };

        CertificateRenderer::new()?.render(&document)
    }

    // ========================================================================
    // Public lookup
    // ========================================================================

    /// Look up a certificate by its public code
    pub async fn public_lookup(&self, code: &str) -> AppResult<PublicCertificate> {
        validate_certificate_code_format(code).map_err(field_error("code"))?;
        let code = normalize_certificate_code(code);

        let record = sqlx::query_as::<_, CertificateRecord>(&format!(
            "{} WHERE ce.code = $1",
            CERTIFICATE_SELECT
        ))
        .bind(&code)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate".to_string()))?;

        Ok(self.redact(record, Utc::now().date_naive()))
    }

    /// Look up every certificate held by a document number
    pub async fn public_lookup_by_document(
        &self,
        document_number: &str,
    ) -> AppResult<Vec<PublicCertificate>> {
        let document_number = document_number.trim().to_uppercase();
        shared::validate_required(&document_number).map_err(field_error("document_number"))?;

        let records = sqlx::query_as::<_, CertificateRecord>(&format!(
            r#"{}
            WHERE UPPER(co.document_number) = $1 AND co.deleted_at IS NULL
            ORDER BY ce.issued_on DESC"#,
            CERTIFICATE_SELECT
        ))
        .bind(&document_number)
        .fetch_all(&self.db)
        .await?;

        let today = Utc::now().date_naive();
        Ok(records
            .into_iter()
            .map(|record| self.redact(record, today))
            .collect())
    }

    fn redact(&self, record: CertificateRecord, today: NaiveDate) -> PublicCertificate {
        let state = CertificateState::evaluate(record.status, record.expires_on, today);
        PublicCertificate {
            signature_valid: verify_certificate_code(
                &self.config.signing_secret,
                record.id,
                &record.code,
            ),
            collaborator_name: certificate_display_name(&record.first_name, &record.last_name),
            document_number: mask_document_number(&record.document_number),
            code: record.code,
            course_name: record.course_name,
            level_name: record.level_name,
            hours: record.hours,
            issued_on: record.issued_on,
            expires_on: record.expires_on,
            state_label: state.display_name_es().to_string(),
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn context(status: TrainingStatus) -> IssuanceContext {
        IssuanceContext {
            training_id: Uuid::new_v4(),
            status,
            course_level_id: Uuid::new_v4(),
            course_min_score: Decimal::from(14),
            level_min_score: None,
            min_attendance_percent: Decimal::from(80),
            validity_months: Some(12),
            required_document_types: vec!["medical_exam".to_string()],
        }
    }

    fn participant(attendance: i64, score: i64) -> ParticipantSnapshot {
        ParticipantSnapshot {
            collaborator_id: Uuid::new_v4(),
            first_name: "Ana".to_string(),
            last_name: "Rojas".to_string(),
            is_active: true,
            attendance_percent: Some(Decimal::from(attendance)),
            score: Some(Decimal::from(score)),
        }
    }

    #[test]
    fn test_code_is_deterministic_and_well_formed() {
        let id = Uuid::new_v4();
        let code = generate_certificate_code("secret", id, 2024);
        assert_eq!(code, generate_certificate_code("secret", id, 2024));
        assert!(code.starts_with("SST-2024-"));
        assert!(validate_certificate_code_format(&code).is_ok());
    }

    #[test]
    fn test_code_depends_on_secret() {
        let id = Uuid::new_v4();
        assert_ne!(
            generate_certificate_code("secret-a", id, 2024),
            generate_certificate_code("secret-b", id, 2024)
        );
    }

    #[test]
    fn test_verify_code() {
        let id = Uuid::new_v4();
        let code = generate_certificate_code("secret", id, 2024);
        assert!(verify_certificate_code("secret", id, &code));
        assert!(verify_certificate_code("secret", id, &code.to_lowercase()));
        assert!(!verify_certificate_code("other", id, &code));
        assert!(!verify_certificate_code("secret", Uuid::new_v4(), &code));
        assert!(!verify_certificate_code("secret", id, "garbage"));
    }

    #[test]
    fn test_assess_participants_splits_by_eligibility() {
        let ctx = context(TrainingStatus::Completed);
        let passing = participant(90, 16);
        let failing = participant(50, 10);
        let participants = vec![passing.clone(), failing.clone()];

        let mut documents = HashMap::new();
        for p in &participants {
            documents.insert(
                p.collaborator_id,
                vec![HeldDocument {
                    document_type: "medical_exam".to_string(),
                    expires_on: None,
                }],
            );
        }

        let results = assess_participants(&ctx, date(2024, 6, 1), &participants, &documents, &HashMap::new());
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_eligible());
        assert_eq!(results[1].1.reasons().len(), 2);
    }

    #[test]
    fn test_assess_participants_detects_existing_certificate() {
        let ctx = context(TrainingStatus::Completed);
        let p = participant(100, 20);
        let participants = vec![p.clone()];

        let mut documents = HashMap::new();
        documents.insert(
            p.collaborator_id,
            vec![HeldDocument {
                document_type: "medical_exam".to_string(),
                expires_on: Some(date(2025, 1, 1)),
            }],
        );
        let mut existing = HashMap::new();
        existing.insert(
            p.collaborator_id,
            vec![ExistingCertificate {
                code: "SST-2024-AAAAAAAA".to_string(),
                status: CertificateStatus::Valid,
                expires_on: Some(date(2024, 12, 31)),
            }],
        );

        let results = assess_participants(&ctx, date(2024, 6, 1), &participants, &documents, &existing);
        assert!(matches!(
            results[0].1.reasons(),
            [IneligibilityReason::AlreadyCertified { .. }]
        ));
    }

    #[test]
    fn test_level_score_overrides_course_in_assessment() {
        let mut ctx = context(TrainingStatus::Completed);
        ctx.required_document_types.clear();
        ctx.level_min_score = Some(Decimal::from(17));
        let participants = vec![participant(100, 16)];

        let results = assess_participants(&ctx, date(2024, 6, 1), &participants, &HashMap::new(), &HashMap::new());
        assert!(matches!(
            results[0].1.reasons(),
            [IneligibilityReason::ScoreBelowMinimum { .. }]
        ));
    }
}
