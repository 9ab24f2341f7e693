//! Printable certificate documents rendered from an embedded HTML template

use minijinja::Environment;
use serde::Serialize;

use crate::error::{AppError, AppResult};

const CERTIFICATE_TEMPLATE_NAME: &str = "certificate.html";
const CERTIFICATE_TEMPLATE: &str = include_str!("certificate.html");

/// Values printed on a certificate. Dates are already formatted for display.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateDocument {
    pub issuer_name: String,
    pub code: String,
    pub collaborator_name: String,
    pub document_type: String,
    pub document_number: String,
    pub course_name: String,
    pub level_name: Option<String>,
    pub hours: String,
    pub score: Option<String>,
    pub city_name: String,
    pub start_date: String,
    pub end_date: String,
    pub issued_on: String,
    pub expires_on: Option<String>,
    pub coach_name: String,
    pub coach_signature_url: Option<String>,
    pub verification_url: String,
    pub state: String,
}

/// Renders certificate documents.
///
/// The template name ends in `.html`, so minijinja escapes every
/// interpolated value.
pub struct CertificateRenderer {
    env: Environment<'static>,
}

impl CertificateRenderer {
    pub fn new() -> AppResult<Self> {
        let mut env = Environment::new();
        env.add_template(CERTIFICATE_TEMPLATE_NAME, CERTIFICATE_TEMPLATE)
            .map_err(|e| AppError::Template(format!("Template parse error: {}", e)))?;
        Ok(Self { env })
    }

    /// Render a certificate as a standalone HTML page
    pub fn render(&self, document: &CertificateDocument) -> AppResult<String> {
        let template = self
            .env
            .get_template(CERTIFICATE_TEMPLATE_NAME)
            .map_err(|e| AppError::Template(format!("Template lookup error: {}", e)))?;

        template
            .render(document)
            .map_err(|e| AppError::Template(format!("Template render error: {}", e)))
    }
}

/// Display format for dates printed on documents
pub fn format_date(date: chrono::NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Public verification link for a certificate code
pub fn verification_url(base_url: &str, code: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), code)
}
