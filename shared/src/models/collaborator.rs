//! Collaborator models

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Kind of personal identity document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// Documento Nacional de Identidad
    Dni,
    /// Carné de extranjería
    Ce,
    Passport,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Dni => "dni",
            DocumentKind::Ce => "ce",
            DocumentKind::Passport => "passport",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dni" => Ok(DocumentKind::Dni),
            "ce" => Ok(DocumentKind::Ce),
            "passport" | "pasaporte" => Ok(DocumentKind::Passport),
            _ => Err(ParseEnumError::new("document kind", s)),
        }
    }
}

/// Supporting document types a collaborator file can hold.
///
/// Courses list which of these must be on file (and not expired) before a
/// certificate can be issued.
pub const SUPPORTING_DOCUMENT_TYPES: &[(&str, &str)] = &[
    ("id_copy", "Copia de documento de identidad"),
    ("medical_exam", "Examen médico ocupacional"),
    ("sctr_policy", "Póliza SCTR"),
    ("induction_record", "Registro de inducción"),
    ("work_at_height_aptitude", "Aptitud para trabajos en altura"),
    ("confined_space_aptitude", "Aptitud para espacios confinados"),
];

/// Check whether a supporting document type is known
pub fn is_known_document_type(document_type: &str) -> bool {
    SUPPORTING_DOCUMENT_TYPES
        .iter()
        .any(|(code, _)| *code == document_type)
}

/// Spanish label for a supporting document type
pub fn document_type_label(document_type: &str) -> &str {
    SUPPORTING_DOCUMENT_TYPES
        .iter()
        .find(|(code, _)| *code == document_type)
        .map(|(_, label)| *label)
        .unwrap_or(document_type)
}

/// Display name as printed on certificates: "LAST NAME, First name"
pub fn certificate_display_name(first_name: &str, last_name: &str) -> String {
    format!("{}, {}", last_name.trim().to_uppercase(), first_name.trim())
}
