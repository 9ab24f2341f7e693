//! EPP inspection sheet pipeline: header mapping, row validation and fan-out
//!
//! Everything here is pure. The service resolves collaborators and the
//! equipment catalog, runs [`plan_import`] and persists the resulting records.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use serde::Serialize;
use shared::EppCondition;
use uuid::Uuid;

use super::sheet::{excel_serial_to_date, Sheet, SheetRow};
use crate::error::{AppError, AppResult};

const DOCUMENT_HEADERS: &[&str] = &["documento", "dni", "document_number", "nro_documento"];
const DATE_HEADERS: &[&str] = &["fecha", "fecha_inspeccion", "inspection_date"];
const INSPECTOR_HEADERS: &[&str] = &["inspector"];
const OBSERVATION_HEADERS: &[&str] = &["observaciones", "observations"];

/// Equipment catalog entry an import column can map to
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRef {
    pub id: Uuid,
    pub code: String,
}

/// Column positions resolved from the header row
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMap {
    pub document_number: usize,
    pub inspection_date: usize,
    pub inspector: Option<usize>,
    pub observations: Option<usize>,
    pub equipment: Vec<(usize, EquipmentRef)>,
}

/// A row that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRow {
    pub row: usize,
    pub collaborator_id: Uuid,
    pub inspection_date: NaiveDate,
    pub inspector_name: Option<String>,
    pub observations: Option<String>,
    pub items: Vec<(Uuid, EppCondition)>,
}

/// Problems found on one sheet row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    pub messages: Vec<String>,
}

/// One inspection record to create
#[derive(Debug, Clone, PartialEq)]
pub struct NewEppRecord {
    pub collaborator_id: Uuid,
    pub equipment_id: Uuid,
    pub inspection_date: NaiveDate,
    pub condition: EppCondition,
    pub requires_replacement: bool,
    pub inspector_name: Option<String>,
    pub observations: Option<String>,
}

/// Validated sheet, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct ImportPlan {
    pub total_rows: usize,
    pub valid_rows: Vec<ValidRow>,
    pub errors: Vec<RowError>,
}

impl ImportPlan {
    /// One record per evaluated equipment cell of every valid row
    pub fn records(&self) -> Vec<NewEppRecord> {
        self.valid_rows
            .iter()
            .flat_map(|row| {
                row.items.iter().map(move |(equipment_id, condition)| NewEppRecord {
                    collaborator_id: row.collaborator_id,
                    equipment_id: *equipment_id,
                    inspection_date: row.inspection_date,
                    condition: *condition,
                    requires_replacement: condition.requires_replacement(),
                    inspector_name: row.inspector_name.clone(),
                    observations: row.observations.clone(),
                })
            })
            .collect()
    }

    pub fn record_count(&self) -> usize {
        self.valid_rows.iter().map(|r| r.items.len()).sum()
    }
}

/// Summary returned to the uploader
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<Uuid>,
    pub dry_run: bool,
    pub total_rows: usize,
    pub imported_rows: usize,
    pub failed_rows: usize,
    pub created_records: usize,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    pub fn from_plan(plan: ImportPlan, batch_id: Option<Uuid>, dry_run: bool) -> Self {
        Self {
            batch_id,
            dry_run,
            total_rows: plan.total_rows,
            imported_rows: plan.valid_rows.len(),
            failed_rows: plan.errors.len(),
            created_records: plan.record_count(),
            errors: plan.errors,
        }
    }
}

// ============================================================================
// Headers
// ============================================================================

/// Normalize a header for matching: accents stripped, lowercased, and runs
/// of spaces, dots, dashes or slashes collapsed into a single `_`.
pub fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut pending_separator = false;

    for c in header.trim().chars() {
        let c = fold_accent(c);
        if c.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.extend(c.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

fn fold_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'ä' | 'â' | 'Á' | 'À' | 'Ä' | 'Â' => 'a',
        'é' | 'è' | 'ë' | 'ê' | 'É' | 'È' | 'Ë' | 'Ê' => 'e',
        'í' | 'ì' | 'ï' | 'î' | 'Í' | 'Ì' | 'Ï' | 'Î' => 'i',
        'ó' | 'ò' | 'ö' | 'ô' | 'Ó' | 'Ò' | 'Ö' | 'Ô' => 'o',
        'ú' | 'ù' | 'ü' | 'û' | 'Ú' | 'Ù' | 'Ü' | 'Û' => 'u',
        'ñ' | 'Ñ' => 'n',
        '°' | 'º' => ' ',
        other => other,
    }
}

/// Resolve the header row against known aliases and the active equipment catalog
pub fn map_headers(headers: &[String], equipment: &[EquipmentRef]) -> AppResult<ColumnMap> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let find = |aliases: &[&str]| normalized.iter().position(|h| aliases.contains(&h.as_str()));

    let document_number = find(DOCUMENT_HEADERS).ok_or_else(|| {
        AppError::Import("Missing document number column (documento, dni)".to_string())
    })?;
    let inspection_date = find(DATE_HEADERS)
        .ok_or_else(|| AppError::Import("Missing inspection date column (fecha)".to_string()))?;

    let catalog: HashMap<String, &EquipmentRef> = equipment
        .iter()
        .map(|e| (normalize_header(&e.code), e))
        .collect();

    let mut seen = HashSet::new();
    let mut equipment_columns = Vec::new();
    for (index, header) in normalized.iter().enumerate() {
        if let Some(item) = catalog.get(header) {
            if !seen.insert(item.id) {
                return Err(AppError::Import(format!(
                    "Equipment column '{}' appears more than once",
                    headers[index].trim()
                )));
            }
            equipment_columns.push((index, (*item).clone()));
        }
    }

    if equipment_columns.is_empty() {
        return Err(AppError::Import(
            "No equipment columns found. Column headers must match equipment codes".to_string(),
        ));
    }

    Ok(ColumnMap {
        document_number,
        inspection_date,
        inspector: find(INSPECTOR_HEADERS),
        observations: find(OBSERVATION_HEADERS),
        equipment: equipment_columns,
    })
}

// ============================================================================
// Rows
// ============================================================================

/// Excel serial of 2000-01-01. Smaller numbers in a date column are years,
/// counts or typos rather than dates.
pub const MIN_SHEET_DATE_SERIAL: f64 = 36526.0;

/// Parse an inspection date cell: `YYYY-MM-DD`, `DD/MM/YYYY`, `DD-MM-YYYY`
/// or an Excel serial number from 2000-01-01 on.
pub fn parse_sheet_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            value
                .parse::<f64>()
                .ok()
                .filter(|serial| *serial >= MIN_SHEET_DATE_SERIAL)
                .and_then(excel_serial_to_date)
        })
}

/// Canonical form of a document number read from a sheet
pub fn normalize_sheet_document(value: &str) -> String {
    value.trim().to_uppercase()
}

/// The 8-digit DNI a 7-digit cell may stand for.
///
/// Numeric cells drop the leading zero of DNIs such as `01234567`.
pub fn padded_dni(document: &str) -> Option<String> {
    (document.len() == 7 && document.chars().all(|c| c.is_ascii_digit()))
        .then(|| format!("0{}", document))
}

/// Collaborator for a normalized sheet document. The value as written wins;
/// the padded DNI is only tried when it matches nobody.
pub fn resolve_collaborator(document: &str, collaborators: &HashMap<String, Uuid>) -> Option<Uuid> {
    collaborators.get(document).copied().or_else(|| {
        padded_dni(document).and_then(|padded| collaborators.get(&padded).copied())
    })
}

/// Distinct document numbers to look up, padded DNI candidates included
pub fn document_numbers(sheet: &Sheet, columns: &ColumnMap) -> Vec<String> {
    let mut numbers: Vec<String> = sheet
        .rows
        .iter()
        .map(|row| normalize_sheet_document(row.cell(columns.document_number)))
        .filter(|n| !n.is_empty())
        .flat_map(|n| {
            let padded = padded_dni(&n);
            std::iter::once(n).chain(padded)
        })
        .collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
}

fn optional_text(row: &SheetRow, column: Option<usize>) -> Option<String> {
    column
        .map(|c| row.cell(c))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Validate every row, collecting all problems per row.
///
/// `collaborators` maps normalized document numbers to live collaborator ids.
pub fn plan_import(
    sheet: &Sheet,
    columns: &ColumnMap,
    collaborators: &HashMap<String, Uuid>,
    today: NaiveDate,
) -> ImportPlan {
    let mut valid_rows = Vec::new();
    let mut errors = Vec::new();
    let mut seen: HashMap<(Uuid, NaiveDate), usize> = HashMap::new();

    for row in &sheet.rows {
        let mut messages = Vec::new();

        let document = normalize_sheet_document(row.cell(columns.document_number));
        let collaborator_id = if document.is_empty() {
            messages.push("Document number is required".to_string());
            None
        } else {
            let id = resolve_collaborator(&document, collaborators);
            if id.is_none() {
                messages.push(format!("No collaborator found with document {}", document));
            }
            id
        };

        let raw_date = row.cell(columns.inspection_date);
        let inspection_date = match parse_sheet_date(raw_date) {
            Some(date) if date > today => {
                messages.push(format!("Inspection date {} is in the future", date));
                None
            }
            Some(date) => Some(date),
            None if raw_date.is_empty() => {
                messages.push("Inspection date is required".to_string());
                None
            }
            None => {
                messages.push(format!("Invalid inspection date '{}'", raw_date));
                None
            }
        };

        let mut items = Vec::new();
        for (index, equipment) in &columns.equipment {
            match EppCondition::parse_cell(row.cell(*index)) {
                Ok(Some(condition)) => items.push((equipment.id, condition)),
                Ok(None) => {}
                Err(_) => messages.push(format!(
                    "Unrecognized condition '{}' for {}",
                    row.cell(*index),
                    equipment.code
                )),
            }
        }
        if items.is_empty() && messages.iter().all(|m| !m.starts_with("Unrecognized")) {
            messages.push("No equipment was evaluated".to_string());
        }

        if let (Some(collaborator_id), Some(date)) = (collaborator_id, inspection_date) {
            if let Some(first_row) = seen.get(&(collaborator_id, date)) {
                messages.push(format!(
                    "Duplicate of row {} (same collaborator and date)",
                    first_row
                ));
            }
        }

        match (collaborator_id, inspection_date) {
            (Some(collaborator_id), Some(inspection_date)) if messages.is_empty() => {
                seen.insert((collaborator_id, inspection_date), row.number);
                valid_rows.push(ValidRow {
                    row: row.number,
                    collaborator_id,
                    inspection_date,
                    inspector_name: optional_text(row, columns.inspector),
                    observations: optional_text(row, columns.observations),
                    items,
                });
            }
            _ => errors.push(RowError {
                row: row.number,
                document_number: Some(document).filter(|d| !d.is_empty()),
                messages,
            }),
        }
    }

    ImportPlan {
        total_rows: sheet.rows.len(),
        valid_rows,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equipment() -> Vec<EquipmentRef> {
        ["CASCO", "GUANTES", "PROTECTOR_AUDITIVO"]
            .iter()
            .map(|code| EquipmentRef {
                id: Uuid::new_v4(),
                code: code.to_string(),
            })
            .collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Fecha Inspección "), "fecha_inspeccion");
        assert_eq!(normalize_header("Nro. Documento"), "nro_documento");
        assert_eq!(normalize_header("N° Documento"), "n_documento");
        assert_eq!(normalize_header("Protector-Auditivo"), "protector_auditivo");
        assert_eq!(normalize_header("OBSERVACIONES"), "observaciones");
    }

    #[test]
    fn test_map_headers_finds_columns() {
        let catalog = equipment();
        let map = map_headers(
            &headers(&["DNI", "Fecha", "Casco", "Protector auditivo", "Observaciones", "Extra"]),
            &catalog,
        )
        .unwrap();
        assert_eq!(map.document_number, 0);
        assert_eq!(map.inspection_date, 1);
        assert_eq!(map.inspector, None);
        assert_eq!(map.observations, Some(4));
        assert_eq!(map.equipment.len(), 2);
        assert_eq!(map.equipment[1].1.code, "PROTECTOR_AUDITIVO");
    }

    #[test]
    fn test_map_headers_requires_columns() {
        let catalog = equipment();
        assert!(map_headers(&headers(&["Fecha", "Casco"]), &catalog).is_err());
        assert!(map_headers(&headers(&["DNI", "Casco"]), &catalog).is_err());
        assert!(map_headers(&headers(&["DNI", "Fecha", "Zapatos"]), &catalog).is_err());
        assert!(map_headers(&headers(&["DNI", "Fecha", "Casco", "CASCO"]), &catalog).is_err());
    }

    #[test]
    fn test_parse_sheet_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_sheet_date("2024-03-05"), expected);
        assert_eq!(parse_sheet_date("05/03/2024"), expected);
        assert_eq!(parse_sheet_date("05-03-2024"), expected);
        assert_eq!(parse_sheet_date("45356"), expected);
        assert_eq!(parse_sheet_date("2024-13-05"), None);
        assert_eq!(parse_sheet_date("yesterday"), None);
    }

    #[test]
    fn test_small_numbers_are_not_dates() {
        assert_eq!(parse_sheet_date("2024"), None);
        assert_eq!(parse_sheet_date("7"), None);
        assert_eq!(parse_sheet_date("36525"), None);
        assert_eq!(parse_sheet_date("36526"), NaiveDate::from_ymd_opt(2000, 1, 1));
    }

    #[test]
    fn test_padded_dni_candidates() {
        assert_eq!(padded_dni("1234567"), Some("01234567".to_string()));
        assert_eq!(padded_dni("45678912"), None);
        assert_eq!(padded_dni("AB12345"), None);
        assert_eq!(normalize_sheet_document(" ab12345 "), "AB12345");
    }

    #[test]
    fn test_resolve_prefers_document_as_written() {
        let passport = Uuid::new_v4();
        let dni = Uuid::new_v4();
        let mut collaborators = HashMap::new();
        collaborators.insert("1234567".to_string(), passport);
        collaborators.insert("01234567".to_string(), dni);
        assert_eq!(resolve_collaborator("1234567", &collaborators), Some(passport));

        collaborators.remove("1234567");
        assert_eq!(resolve_collaborator("1234567", &collaborators), Some(dni));
        assert_eq!(resolve_collaborator("7654321", &collaborators), None);
    }
}
