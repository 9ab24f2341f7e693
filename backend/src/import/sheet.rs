//! Spreadsheet reading: the first worksheet of an Excel/ODS workbook, or a CSV file

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate};

use crate::error::{AppError, AppResult};

/// Supported upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Csv,
}

impl SheetFormat {
    /// Detect the format from the uploaded file name
    pub fn from_file_name(file_name: &str) -> AppResult<Self> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(SheetFormat::Workbook),
            "csv" => Ok(SheetFormat::Csv),
            _ => Err(AppError::Import(format!(
                "Unsupported file type '{}'. Upload an .xlsx, .xls, .ods or .csv file",
                file_name
            ))),
        }
    }
}

/// A data row with its 1-based row number in the sheet
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub number: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    /// Trimmed cell value, empty when the row is short
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|c| c.trim()).unwrap_or("")
    }
}

/// Header row plus data rows, blank rows removed
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl Sheet {
    /// Build a sheet from raw rows. The first non-blank row is the header.
    pub fn from_rows(raw: Vec<(usize, Vec<String>)>, max_rows: usize) -> AppResult<Self> {
        let mut rows = raw
            .into_iter()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()));

        let (_, headers) = rows
            .next()
            .ok_or_else(|| AppError::Import("The sheet is empty".to_string()))?;

        let rows: Vec<SheetRow> = rows
            .map(|(number, cells)| SheetRow { number, cells })
            .collect();

        if rows.len() > max_rows {
            return Err(AppError::Import(format!(
                "The sheet has {} data rows; at most {} are accepted per upload",
                rows.len(),
                max_rows
            )));
        }

        Ok(Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows,
        })
    }
}

/// Read an uploaded sheet
pub fn read_sheet(file_name: &str, bytes: Vec<u8>, max_rows: usize) -> AppResult<Sheet> {
    let raw = match SheetFormat::from_file_name(file_name)? {
        SheetFormat::Workbook => read_workbook(bytes)?,
        SheetFormat::Csv => read_csv(&bytes)?,
    };
    Sheet::from_rows(raw, max_rows)
}

fn read_workbook(bytes: Vec<u8>) -> AppResult<Vec<(usize, Vec<String>)>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::Import(format!("Could not open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Import("The workbook has no worksheets".to_string()))?
        .map_err(|e| AppError::Import(format!("Could not read worksheet: {}", e)))?;

    // Ranges start at the first used cell, not at A1
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

    Ok(range
        .rows()
        .enumerate()
        .map(|(index, cells)| {
            (
                first_row + index + 1,
                cells.iter().map(cell_to_string).collect(),
            )
        })
        .collect())
}

fn read_csv(bytes: &[u8]) -> AppResult<Vec<(usize, Vec<String>)>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AppError::Import("CSV files must be UTF-8 encoded".to_string()))?;
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(detect_delimiter(text))
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| AppError::Import(format!("Malformed CSV at line {}: {}", index + 1, e)))?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(index + 1);
        rows.push((line, record.iter().map(|c| c.trim().to_string()).collect()));
    }
    Ok(rows)
}

/// Spreadsheet exports in Spanish locales use `;`
fn detect_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// Render a cell as text. Dates become ISO `YYYY-MM-DD`, whole numbers
/// lose their trailing `.0`.
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format_number(dt.as_f64())),
        Data::DateTimeIso(s) => s.chars().take(10).collect(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("#{:?}", e),
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }
    // Day 60 is the fictitious 1900-02-29; the 1899-12-30 epoch is exact from day 61
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(SheetFormat::from_file_name("epp.XLSX").unwrap(), SheetFormat::Workbook);
        assert_eq!(SheetFormat::from_file_name("epp.ods").unwrap(), SheetFormat::Workbook);
        assert_eq!(SheetFormat::from_file_name("epp.csv").unwrap(), SheetFormat::Csv);
        assert!(SheetFormat::from_file_name("epp.pdf").is_err());
        assert!(SheetFormat::from_file_name("epp").is_err());
    }

    #[test]
    fn test_excel_serial_dates() {
        assert_eq!(excel_serial_to_date(45292.0), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(excel_serial_to_date(45292.75), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&Data::Float(45678912.0)), "45678912");
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::String("  B ".to_string())), "B");
        assert_eq!(cell_to_string(&Data::Empty), "");
        assert_eq!(cell_to_string(&Data::DateTimeIso("2024-03-05T00:00:00".to_string())), "2024-03-05");
    }

    #[test]
    fn test_csv_with_semicolons_and_bom() {
        let csv = "\u{feff}Documento;Fecha;Casco\n45678912;05/03/2024;B\n\n;;\n12345678;2024-03-06;M\n";
        let sheet = read_sheet("epp.csv", csv.as_bytes().to_vec(), 100).unwrap();
        assert_eq!(sheet.headers, vec!["Documento", "Fecha", "Casco"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].number, 2);
        assert_eq!(sheet.rows[0].cell(2), "B");
        assert_eq!(sheet.rows[1].number, 5);
        assert_eq!(sheet.rows[1].cell(7), "");
    }

    #[test]
    fn test_row_limit() {
        let csv = "documento,fecha\n1,2024-01-01\n2,2024-01-01\n3,2024-01-01\n";
        assert!(read_sheet("epp.csv", csv.as_bytes().to_vec(), 2).is_err());
        assert!(read_sheet("epp.csv", csv.as_bytes().to_vec(), 3).is_ok());
    }

    #[test]
    fn test_empty_sheet_is_rejected() {
        assert!(matches!(
            read_sheet("epp.csv", b"\n\n".to_vec(), 10),
            Err(AppError::Import(_))
        ));
    }
}
