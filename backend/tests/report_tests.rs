//! Monthly report tests
//!
//! Calendar bounds, derived rates and CSV export of monthly reports.

use chrono::{Datelike, NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{month_bounds, month_name_es, validate_year_month, MonthlyMetrics, ReportStatus};
use sst_training_backend::services::reporting::{MonthlyReport, ReportCsvRow, ReportingService};
use uuid::Uuid;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// The month covers its first through last day and nothing else
    #[test]
    fn prop_month_bounds_cover_the_month(year in 2000i32..=2100, month in 1u32..=12) {
        let (first, last) = month_bounds(year, month).unwrap();
        prop_assert_eq!(first.day(), 1);
        prop_assert_eq!(first.month(), month);
        prop_assert_eq!(last.month(), month);
        prop_assert_ne!(last.succ_opt().unwrap().month(), month);
        prop_assert!(validate_year_month(year, month).is_ok());
    }

    /// Rates stay within 0..=100 whenever the denominators are positive
    #[test]
    fn prop_rates_are_percentages(trained in 1i64..10_000, approved_share in 0.0f64..=1.0,
                                  performed in 1i64..1000, failed_share in 0.0f64..=1.0) {
        let metrics = MonthlyMetrics {
            participants_trained: trained,
            participants_approved: (trained as f64 * approved_share) as i64,
            inspections_performed: performed,
            inspections_non_compliant: (performed as f64 * failed_share) as i64,
            ..Default::default()
        };
        let approval = metrics.approval_rate().unwrap();
        let compliance = metrics.inspection_compliance_rate().unwrap();
        prop_assert!(approval >= Decimal::ZERO && approval <= Decimal::from(100));
        prop_assert!(compliance >= Decimal::ZERO && compliance <= Decimal::from(100));
    }
}

#[test]
fn test_invalid_periods() {
    assert!(validate_year_month(2024, 0).is_err());
    assert!(validate_year_month(2024, 13).is_err());
    assert!(validate_year_month(1999, 5).is_err());
    assert!(month_bounds(2024, 13).is_none());
    assert_eq!(month_name_es(9), "Septiembre");
}

#[test]
fn test_rates_without_activity() {
    let metrics = MonthlyMetrics::default();
    assert_eq!(metrics.approval_rate(), None);
    assert_eq!(metrics.inspection_compliance_rate(), None);
}

fn report(regional: &str, month: i32) -> MonthlyReport {
    MonthlyReport {
        id: Uuid::new_v4(),
        regional_id: Uuid::new_v4(),
        regional_name: regional.to_string(),
        year: 2024,
        month,
        status: ReportStatus::Draft,
        trainings_completed: 2,
        participants_trained: 0,
        participants_approved: 0,
        training_hours: Decimal::ZERO,
        certificates_issued: 0,
        inspections_performed: 3,
        inspections_non_compliant: 3,
        epp_items_inspected: 24,
        epp_items_requiring_replacement: 2,
        notes: Some("Sin observaciones".to_string()),
        generated_at: Utc::now(),
        generated_by: None,
        closed_at: None,
        closed_by: None,
    }
}

#[test]
fn test_csv_export_quotes_and_blank_rates() {
    let rows: Vec<ReportCsvRow> = [report("Arequipa, Sur", 1), report("Cusco", 12)]
        .iter()
        .map(ReportCsvRow::from)
        .collect();
    let csv = ReportingService::export_to_csv(&rows).unwrap();

    let mut reader = csv::Reader::from_reader(csv.as_bytes());
    let headers = reader.headers().unwrap().clone();
    let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();

    let column = |name: &str| headers.iter().position(|h| h == name).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][column("regional")], "Arequipa, Sur");
    assert_eq!(&records[0][column("month")], "Enero");
    assert_eq!(&records[1][column("month")], "Diciembre");
    assert_eq!(&records[0][column("approval_rate")], "");
    let compliance: Decimal = records[0][column("inspection_compliance_rate")].parse().unwrap();
    assert_eq!(compliance, Decimal::ZERO);
}

#[test]
fn test_report_metrics_view() {
    let metrics = report("Lima", 5).metrics();
    assert_eq!(metrics.trainings_completed, 2);
    assert_eq!(metrics.epp_items_requiring_replacement, 2);
    assert_eq!(NaiveDate::from_ymd_opt(2024, 5, 1).map(|d| d.month()), Some(5));
}
