//! WebAssembly module for the SST Training Management Platform
//!
//! Client-side checks for the browser forms, so users get the same answers
//! the backend gives before submitting:
//! - Document number and certificate code formats
//! - EPP condition cells
//! - Certificate approval preview and expiry date

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use shared::{
    certificate_expiry, evaluate_eligibility, normalize_certificate_code,
    validate_certificate_code_format, ApprovalThresholds, DocumentKind, EligibilityCheck,
    EppCondition, TrainingStatus,
};

fn js_error(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

/// Returns an error message, or `undefined` when the number is valid
#[wasm_bindgen]
pub fn check_document_number(kind: &str, number: &str) -> Result<Option<String>, JsValue> {
    let kind = DocumentKind::parse(kind).map_err(js_error)?;
    Ok(shared::validate_document_number(kind, number)
        .err()
        .map(str::to_string))
}

/// Returns an error message, or `undefined` when the code is well formed
#[wasm_bindgen]
pub fn check_certificate_code(code: &str) -> Option<String> {
    validate_certificate_code_format(code)
        .err()
        .map(str::to_string)
}

/// Upper-cased, trimmed certificate code as stored by the backend
#[wasm_bindgen]
pub fn normalize_code(code: &str) -> String {
    normalize_certificate_code(code)
}

/// Read an EPP sheet cell: `"good" | "fair" | "bad"`, or `undefined` for
/// not-applicable cells
#[wasm_bindgen]
pub fn parse_epp_condition(cell: &str) -> Result<Option<String>, JsValue> {
    let condition = EppCondition::parse_cell(cell).map_err(js_error)?;
    Ok(condition.map(|c| c.as_str().to_string()))
}

/// Whether a condition value means the item must be replaced
#[wasm_bindgen]
pub fn epp_requires_replacement(cell: &str) -> bool {
    matches!(EppCondition::parse_cell(cell), Ok(Some(c)) if c.requires_replacement())
}

/// Expiry date (`YYYY-MM-DD`) of a certificate issued on `issued_on`,
/// or `undefined` when the course has no validity period
#[wasm_bindgen]
pub fn certificate_expiry_date(
    issued_on: &str,
    validity_months: Option<i32>,
) -> Result<Option<String>, JsValue> {
    let issued_on = NaiveDate::parse_from_str(issued_on, "%Y-%m-%d").map_err(js_error)?;
    Ok(certificate_expiry(issued_on, validity_months).map(|d| d.format("%Y-%m-%d").to_string()))
}

#[derive(Serialize)]
struct ApprovalPreview {
    approved: bool,
    reasons: Vec<String>,
}

/// Preview whether a participant's results qualify for a certificate.
///
/// Returns JSON `{approved, reasons}` with reasons in Spanish.
#[wasm_bindgen]
pub fn preview_approval(
    attendance_percent: Option<f64>,
    score: Option<f64>,
    min_attendance_percent: f64,
    course_min_score: f64,
    level_min_score: Option<f64>,
) -> Result<String, JsValue> {
    let to_decimal = |value: f64| Decimal::try_from(value).map_err(js_error);

    let thresholds = ApprovalThresholds::for_level(
        to_decimal(course_min_score)?,
        level_min_score.map(to_decimal).transpose()?,
        to_decimal(min_attendance_percent)?,
    );

    let check = EligibilityCheck {
        issue_date: chrono::Utc::now().date_naive(),
        training_status: TrainingStatus::Completed,
        collaborator_active: true,
        attendance_percent: attendance_percent.map(to_decimal).transpose()?,
        score: score.map(to_decimal).transpose()?,
        thresholds: &thresholds,
        required_documents: &[],
        documents_on_file: &[],
        existing_certificates: &[],
    };

    let eligibility = evaluate_eligibility(&check);
    let preview = ApprovalPreview {
        approved: eligibility.is_eligible(),
        reasons: eligibility.reasons().iter().map(|r| r.message_es()).collect(),
    };
    serde_json::to_string(&preview).map_err(js_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_certificate_code() {
        assert!(check_certificate_code("SST-2024").is_some());
        assert_eq!(normalize_code("  sst-2024-abcd2345 "), "SST-2024-ABCD2345");
    }

    #[test]
    fn test_epp_requires_replacement() {
        assert!(epp_requires_replacement("M"));
        assert!(!epp_requires_replacement("B"));
        assert!(!epp_requires_replacement("N/A"));
    }

    #[test]
    fn test_certificate_expiry_date() {
        assert_eq!(
            certificate_expiry_date("2024-01-31", Some(1)).ok().flatten(),
            Some("2024-02-29".to_string())
        );
        assert_eq!(certificate_expiry_date("2024-01-31", None).ok().flatten(), None);
    }

    #[test]
    fn test_preview_approval() {
        let approved = preview_approval(Some(90.0), Some(16.0), 80.0, 14.0, None).unwrap();
        assert!(approved.contains("\"approved\":true"));

        let rejected = preview_approval(Some(60.0), None, 80.0, 14.0, Some(15.0)).unwrap();
        assert!(rejected.contains("\"approved\":false"));
    }
}
