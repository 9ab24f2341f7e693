//! Certificate models and issuance rules

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ParseEnumError, TrainingStatus};

/// Stored status of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Valid,
    Revoked,
}

impl CertificateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateStatus::Valid => "valid",
            CertificateStatus::Revoked => "revoked",
        }
    }
}

/// State of a certificate as seen on a given date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateState {
    Valid,
    Expired,
    Revoked,
}

impl CertificateState {
    /// Evaluate a certificate's state on `today`
    pub fn evaluate(
        status: CertificateStatus,
        expires_on: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        match (status, expires_on) {
            (CertificateStatus::Revoked, _) => CertificateState::Revoked,
            (CertificateStatus::Valid, Some(expiry)) if expiry < today => CertificateState::Expired,
            (CertificateStatus::Valid, _) => CertificateState::Valid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateState::Valid => "valid",
            CertificateState::Expired => "expired",
            CertificateState::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "valid" => Ok(CertificateState::Valid),
            "expired" => Ok(CertificateState::Expired),
            "revoked" => Ok(CertificateState::Revoked),
            _ => Err(ParseEnumError::new("certificate state", s)),
        }
    }

    pub fn display_name_es(&self) -> &'static str {
        match self {
            CertificateState::Valid => "Vigente",
            CertificateState::Expired => "Vencido",
            CertificateState::Revoked => "Anulado",
        }
    }
}

/// Days before expiration at which certificates are flagged
pub const EXPIRATION_ALERT_DAYS: [i64; 3] = [60, 30, 15];

/// Smallest alert threshold a certificate expiring in `days_until` falls under
pub fn expiration_alert_threshold(days_until: i64) -> Option<i64> {
    if days_until < 0 {
        return None;
    }
    EXPIRATION_ALERT_DAYS
        .iter()
        .copied()
        .filter(|threshold| days_until <= *threshold)
        .min()
}

/// Compute a certificate's expiry date.
///
/// Month arithmetic is calendar based and clamps to the end of the month
/// (2024-01-31 + 1 month = 2024-02-29). A course without a validity period
/// issues certificates that never expire.
pub fn certificate_expiry(issued_on: NaiveDate, validity_months: Option<i32>) -> Option<NaiveDate> {
    let months = u32::try_from(validity_months?).ok().filter(|m| *m > 0)?;
    issued_on.checked_add_months(Months::new(months))
}

// ============================================================================
// Eligibility
// ============================================================================

/// Approval thresholds that apply to a course level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalThresholds {
    pub min_score: Decimal,
    pub min_attendance_percent: Decimal,
}

impl ApprovalThresholds {
    /// A level's own minimum score overrides the course's
    pub fn for_level(
        course_min_score: Decimal,
        level_min_score: Option<Decimal>,
        min_attendance_percent: Decimal,
    ) -> Self {
        Self {
            min_score: level_min_score.unwrap_or(course_min_score),
            min_attendance_percent,
        }
    }
}

/// A supporting document on a collaborator's file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeldDocument {
    pub document_type: String,
    pub expires_on: Option<NaiveDate>,
}

/// A certificate the collaborator already holds for the same course level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingCertificate {
    pub code: String,
    pub status: CertificateStatus,
    pub expires_on: Option<NaiveDate>,
}

/// Everything needed to decide whether a participant gets a certificate
#[derive(Debug, Clone)]
pub struct EligibilityCheck<'a> {
    pub issue_date: NaiveDate,
    pub training_status: TrainingStatus,
    pub collaborator_active: bool,
    pub attendance_percent: Option<Decimal>,
    pub score: Option<Decimal>,
    pub thresholds: &'a ApprovalThresholds,
    pub required_documents: &'a [String],
    pub documents_on_file: &'a [HeldDocument],
    pub existing_certificates: &'a [ExistingCertificate],
}

/// Why a participant cannot be certified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    TrainingNotCompleted,
    CollaboratorInactive,
    ResultNotRecorded,
    AttendanceBelowMinimum { required: Decimal, actual: Decimal },
    ScoreBelowMinimum { required: Decimal, actual: Decimal },
    MissingDocuments { document_types: Vec<String> },
    AlreadyCertified {
        code: String,
        expires_on: Option<NaiveDate>,
    },
}

impl IneligibilityReason {
    pub fn message_en(&self) -> String {
        match self {
            IneligibilityReason::TrainingNotCompleted => "Training is not completed".to_string(),
            IneligibilityReason::CollaboratorInactive => "Collaborator is inactive".to_string(),
            IneligibilityReason::ResultNotRecorded => {
                "Attendance or score has not been recorded".to_string()
            }
            IneligibilityReason::AttendanceBelowMinimum { required, actual } => {
                format!("Attendance {}% is below the required {}%", actual, required)
            }
            IneligibilityReason::ScoreBelowMinimum { required, actual } => {
                format!("Score {} is below the required {}", actual, required)
            }
            IneligibilityReason::MissingDocuments { document_types } => {
                format!("Missing or expired documents: {}", document_types.join(", "))
            }
            IneligibilityReason::AlreadyCertified { code, .. } => {
                format!("Already holds valid certificate {}", code)
            }
        }
    }

    pub fn message_es(&self) -> String {
        match self {
            IneligibilityReason::TrainingNotCompleted => {
                "La capacitación no está finalizada".to_string()
            }
            IneligibilityReason::CollaboratorInactive => "El colaborador está inactivo".to_string(),
            IneligibilityReason::ResultNotRecorded => {
                "No se registró asistencia o nota".to_string()
            }
            IneligibilityReason::AttendanceBelowMinimum { required, actual } => {
                format!("Asistencia {}% menor al mínimo de {}%", actual, required)
            }
            IneligibilityReason::ScoreBelowMinimum { required, actual } => {
                format!("Nota {} menor a la mínima aprobatoria {}", actual, required)
            }
            IneligibilityReason::MissingDocuments { document_types } => {
                format!("Documentos faltantes o vencidos: {}", document_types.join(", "))
            }
            IneligibilityReason::AlreadyCertified { code, .. } => {
                format!("Ya cuenta con el certificado vigente {}", code)
            }
        }
    }
}

/// Outcome of an eligibility evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible,
    Ineligible(Vec<IneligibilityReason>),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    pub fn reasons(&self) -> &[IneligibilityReason] {
        match self {
            Eligibility::Eligible => &[],
            Eligibility::Ineligible(reasons) => reasons,
        }
    }
}

/// Document types required by the course that are absent or expired on `on_date`
pub fn missing_documents(
    required: &[String],
    on_file: &[HeldDocument],
    on_date: NaiveDate,
) -> Vec<String> {
    required
        .iter()
        .filter(|required_type| {
            !on_file.iter().any(|doc| {
                &doc.document_type == *required_type
                    && doc.expires_on.map_or(true, |expiry| expiry >= on_date)
            })
        })
        .cloned()
        .collect()
}

/// Evaluate every certification rule, collecting all failures
pub fn evaluate_eligibility(check: &EligibilityCheck<'_>) -> Eligibility {
    let mut reasons = Vec::new();

    if check.training_status != TrainingStatus::Completed {
        reasons.push(IneligibilityReason::TrainingNotCompleted);
    }

    if !check.collaborator_active {
        reasons.push(IneligibilityReason::CollaboratorInactive);
    }

    if check.attendance_percent.is_none() || check.score.is_none() {
        reasons.push(IneligibilityReason::ResultNotRecorded);
    }

    if let Some(actual) = check.attendance_percent {
        if actual < check.thresholds.min_attendance_percent {
            reasons.push(IneligibilityReason::AttendanceBelowMinimum {
                required: check.thresholds.min_attendance_percent,
                actual,
            });
        }
    }

    if let Some(actual) = check.score {
        if actual < check.thresholds.min_score {
            reasons.push(IneligibilityReason::ScoreBelowMinimum {
                required: check.thresholds.min_score,
                actual,
            });
        }
    }

    let missing = missing_documents(
        check.required_documents,
        check.documents_on_file,
        check.issue_date,
    );
    if !missing.is_empty() {
        reasons.push(IneligibilityReason::MissingDocuments {
            document_types: missing,
        });
    }

    let still_valid = check.existing_certificates.iter().find(|cert| {
        CertificateState::evaluate(cert.status, cert.expires_on, check.issue_date)
            == CertificateState::Valid
    });
    if let Some(cert) = still_valid {
        reasons.push(IneligibilityReason::AlreadyCertified {
            code: cert.code.clone(),
            expires_on: cert.expires_on,
        });
    }

    if reasons.is_empty() {
        Eligibility::Eligible
    } else {
        Eligibility::Ineligible(reasons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_expiry_clamps_to_month_end() {
        assert_eq!(
            certificate_expiry(date(2024, 1, 31), Some(1)),
            Some(date(2024, 2, 29))
        );
        assert_eq!(
            certificate_expiry(date(2023, 1, 31), Some(1)),
            Some(date(2023, 2, 28))
        );
    }

    #[test]
    fn test_expiry_without_validity() {
        assert_eq!(certificate_expiry(date(2024, 5, 10), None), None);
        assert_eq!(certificate_expiry(date(2024, 5, 10), Some(0)), None);
        assert_eq!(certificate_expiry(date(2024, 5, 10), Some(-3)), None);
    }

    #[test]
    fn test_state_evaluation() {
        let today = date(2024, 6, 1);
        assert_eq!(
            CertificateState::evaluate(CertificateStatus::Valid, Some(date(2024, 6, 1)), today),
            CertificateState::Valid
        );
        assert_eq!(
            CertificateState::evaluate(CertificateStatus::Valid, Some(date(2024, 5, 31)), today),
            CertificateState::Expired
        );
        assert_eq!(
            CertificateState::evaluate(CertificateStatus::Revoked, None, today),
            CertificateState::Revoked
        );
        assert_eq!(
            CertificateState::evaluate(CertificateStatus::Valid, None, today),
            CertificateState::Valid
        );
    }

    #[test]
    fn test_alert_threshold() {
        assert_eq!(expiration_alert_threshold(61), None);
        assert_eq!(expiration_alert_threshold(60), Some(60));
        assert_eq!(expiration_alert_threshold(30), Some(30));
        assert_eq!(expiration_alert_threshold(3), Some(15));
        assert_eq!(expiration_alert_threshold(-1), None);
    }

    #[test]
    fn test_level_overrides_course_score() {
        let t = ApprovalThresholds::for_level(Decimal::from(14), Some(Decimal::from(16)), Decimal::from(80));
        assert_eq!(t.min_score, Decimal::from(16));
        let t = ApprovalThresholds::for_level(Decimal::from(14), None, Decimal::from(80));
        assert_eq!(t.min_score, Decimal::from(14));
    }

    #[test]
    fn test_missing_documents_respects_expiry() {
        let required = vec!["medical_exam".to_string(), "sctr_policy".to_string()];
        let on_file = vec![
            HeldDocument {
                document_type: "medical_exam".to_string(),
                expires_on: Some(date(2024, 1, 1)),
            },
            HeldDocument {
                document_type: "sctr_policy".to_string(),
                expires_on: None,
            },
        ];
        assert_eq!(
            missing_documents(&required, &on_file, date(2024, 3, 1)),
            vec!["medical_exam".to_string()]
        );
        assert!(missing_documents(&required, &on_file, date(2023, 12, 31)).is_empty());
    }
}
