//! EPP spreadsheet import tests
//!
//! Header mapping, row validation and record fan-out, exercised on sheets
//! built in memory (CSV bytes or raw rows).

use std::collections::HashMap;

use chrono::NaiveDate;
use proptest::prelude::*;
use shared::EppCondition;
use sst_training_backend::error::AppError;
use sst_training_backend::import::{
    map_headers, normalize_header, plan_import, read_sheet, EquipmentRef, ImportReport, Sheet,
};
use sst_training_backend::import::epp::document_numbers;
use uuid::Uuid;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn catalog() -> Vec<EquipmentRef> {
    ["CASCO", "LENTES", "GUANTES", "PROTECTOR_AUDITIVO"]
        .iter()
        .map(|code| EquipmentRef {
            id: Uuid::new_v4(),
            code: code.to_string(),
        })
        .collect()
}

fn collaborators(documents: &[&str]) -> HashMap<String, Uuid> {
    documents
        .iter()
        .map(|d| (d.to_string(), Uuid::new_v4()))
        .collect()
}

// ============================================================================
// Header mapping
// ============================================================================

#[test]
fn test_headers_match_aliases_and_equipment_codes() {
    let headers: Vec<String> = ["N° Documento", "Fecha Inspección", "Inspector", "Casco", "Protector Auditivo", "Comentario"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let equipment = catalog();

    // "N° Documento" normalizes to n_documento, which is not an alias
    assert!(map_headers(&headers, &equipment).is_err());

    let headers: Vec<String> = ["DNI", "Fecha Inspección", "Inspector", "Casco", "Protector Auditivo", "Comentario"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let columns = map_headers(&headers, &equipment).unwrap();

    assert_eq!(columns.document_number, 0);
    assert_eq!(columns.inspection_date, 1);
    assert_eq!(columns.inspector, Some(2));
    assert_eq!(columns.observations, None);
    let codes: Vec<&str> = columns.equipment.iter().map(|(_, e)| e.code.as_str()).collect();
    assert_eq!(codes, vec!["CASCO", "PROTECTOR_AUDITIVO"]);
}

#[test]
fn test_sheet_without_equipment_columns_is_rejected() {
    let headers = vec!["documento".to_string(), "fecha".to_string(), "botas".to_string()];
    assert!(matches!(map_headers(&headers, &catalog()), Err(AppError::Import(_))));
}

#[test]
fn test_missing_date_column_is_rejected() {
    let headers = vec!["documento".to_string(), "casco".to_string()];
    assert!(matches!(map_headers(&headers, &catalog()), Err(AppError::Import(_))));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Case, accents and separators never change the normalized header
    #[test]
    fn prop_header_normalization_is_insensitive(
        upper in any::<bool>(),
        separator in prop_oneof![Just(" "), Just("-"), Just("."), Just("  "), Just("_")],
        accent in any::<bool>(),
    ) {
        let base = if accent { "fecha inspección" } else { "fecha inspeccion" };
        let mut header = base.replace(' ', separator);
        if upper {
            header = header.to_uppercase();
        }
        prop_assert_eq!(normalize_header(&header), "fecha_inspeccion");
    }
}

// ============================================================================
// Row validation & fan-out
// ============================================================================

#[test]
fn test_csv_import_plan() {
    let csv = "\
documento;fecha;inspector;casco;lentes;guantes
45678912;05/06/2024;J. Pérez;B;M;N/A
1234567;2024-06-05;;R;B;B
99999999;2024-06-05;;B;;
45678912;2024-06-05;;B;B;B
45678913;2024-07-15;;X;;
;;;;;
45678914;;;;;
";
    let sheet = read_sheet("epp.csv", csv.as_bytes().to_vec(), 100).unwrap();
    let columns = map_headers(&sheet.headers, &catalog()).unwrap();
    let known = collaborators(&["45678912", "01234567", "45678913", "45678914"]);

    let plan = plan_import(&sheet, &columns, &known, today());

    assert_eq!(plan.total_rows, 6);
    assert_eq!(plan.valid_rows.len(), 2);
    assert_eq!(plan.record_count(), 5);

    let rows: Vec<usize> = plan.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![4, 5, 6, 8]);

    let unknown = &plan.errors[0];
    assert!(unknown.messages[0].contains("No collaborator found with document 99999999"));

    let duplicate = &plan.errors[1];
    assert!(duplicate.messages.iter().any(|m| m.contains("Duplicate of row 2")));

    let future = &plan.errors[2];
    assert!(future.messages.iter().any(|m| m.contains("in the future")));
    assert!(future.messages.iter().any(|m| m.contains("Unrecognized condition 'X'")));
    assert!(!future.messages.iter().any(|m| m.contains("No equipment was evaluated")));

    let empty = &plan.errors[3];
    assert!(empty.messages.contains(&"Inspection date is required".to_string()));
    assert!(empty.messages.contains(&"No equipment was evaluated".to_string()));

    let records = plan.records();
    let bad: Vec<_> = records.iter().filter(|r| r.requires_replacement).collect();
    assert_eq!(bad.len(), 1);
    assert_eq!(bad[0].condition, EppCondition::Bad);
    assert_eq!(records[0].inspector_name.as_deref(), Some("J. Pérez"));

    let report = ImportReport::from_plan(plan, None, true);
    assert_eq!(report.imported_rows + report.failed_rows, report.total_rows);
    assert_eq!(report.created_records, 5);
    assert!(report.dry_run);
}

#[test]
fn test_seven_character_passport_matches_as_written() {
    let csv = "documento,fecha,casco\n1234567,2024-03-05,B\n";
    let sheet = read_sheet("epp.csv", csv.as_bytes().to_vec(), 10).unwrap();
    let columns = map_headers(&sheet.headers, &catalog()).unwrap();

    let lookups = document_numbers(&sheet, &columns);
    assert!(lookups.contains(&"1234567".to_string()));
    assert!(lookups.contains(&"01234567".to_string()));

    let known = collaborators(&["1234567"]);
    let plan = plan_import(&sheet, &columns, &known, today());
    assert!(plan.errors.is_empty(), "unexpected errors: {:?}", plan.errors);
    assert_eq!(plan.valid_rows[0].collaborator_id, known["1234567"]);
}

#[test]
fn test_numeric_date_cells_before_2000_are_rejected() {
    let csv = "documento,fecha,casco\n45678912,2024,B\n45678912,7,B\n45678912,45356,B\n";
    let sheet = read_sheet("epp.csv", csv.as_bytes().to_vec(), 10).unwrap();
    let columns = map_headers(&sheet.headers, &catalog()).unwrap();
    let known = collaborators(&["45678912"]);

    let plan = plan_import(&sheet, &columns, &known, today());

    let rows: Vec<usize> = plan.errors.iter().map(|e| e.row).collect();
    assert_eq!(rows, vec![2, 3]);
    assert!(plan.errors[0].messages.contains(&"Invalid inspection date '2024'".to_string()));
    assert_eq!(plan.valid_rows.len(), 1);
    assert_eq!(
        plan.valid_rows[0].inspection_date,
        NaiveDate::from_ymd_opt(2024, 3, 5).unwrap()
    );
}

fn condition_cell() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("B"),
        Just("R"),
        Just("M"),
        Just("N/A"),
        Just(""),
        Just("??"),
    ]
}

fn row_strategy() -> impl Strategy<Value = (bool, Vec<&'static str>)> {
    (any::<bool>(), prop::collection::vec(condition_cell(), 3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Records = evaluated cells of valid rows; invalid rows create nothing
    #[test]
    fn prop_fan_out_counts(rows in prop::collection::vec(row_strategy(), 1..40)) {
        let equipment = catalog();
        let mut known = HashMap::new();
        let mut raw = vec![(1usize, vec![
            "documento".to_string(),
            "fecha".to_string(),
            "casco".to_string(),
            "lentes".to_string(),
            "guantes".to_string(),
        ])];

        for (index, (registered, cells)) in rows.iter().enumerate() {
            let document = format!("{:08}", index + 1);
            if *registered {
                known.insert(document.clone(), Uuid::new_v4());
            }
            let mut line = vec![document, "2024-06-01".to_string()];
            line.extend(cells.iter().map(|c| c.to_string()));
            raw.push((index + 2, line));
        }

        let sheet = Sheet::from_rows(raw, 1000).unwrap();
        let columns = map_headers(&sheet.headers, &equipment).unwrap();
        let plan = plan_import(&sheet, &columns, &known, today());

        let expected_records: usize = rows
            .iter()
            .filter(|(registered, cells)| {
                *registered
                    && !cells.contains(&"??")
                    && cells.iter().any(|c| matches!(*c, "B" | "R" | "M"))
            })
            .map(|(_, cells)| cells.iter().filter(|c| matches!(**c, "B" | "R" | "M")).count())
            .sum();

        prop_assert_eq!(plan.record_count(), expected_records);
        prop_assert_eq!(plan.valid_rows.len() + plan.errors.len(), plan.total_rows);
        prop_assert_eq!(plan.total_rows, rows.len());
    }
}
