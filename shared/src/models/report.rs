//! Monthly report models

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle of a monthly report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Draft,
    Closed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Draft => "draft",
            ReportStatus::Closed => "closed",
        }
    }
}

/// Metrics aggregated for a regional over one calendar month
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyMetrics {
    pub trainings_completed: i64,
    pub participants_trained: i64,
    pub participants_approved: i64,
    pub training_hours: Decimal,
    pub certificates_issued: i64,
    pub inspections_performed: i64,
    pub inspections_non_compliant: i64,
    pub epp_items_inspected: i64,
    pub epp_items_requiring_replacement: i64,
}

impl MonthlyMetrics {
    /// Share of trained participants that were approved, as a percentage
    pub fn approval_rate(&self) -> Option<Decimal> {
        percentage(self.participants_approved, self.participants_trained)
    }

    /// Share of inspections that were fully compliant, as a percentage
    pub fn inspection_compliance_rate(&self) -> Option<Decimal> {
        percentage(
            self.inspections_performed - self.inspections_non_compliant,
            self.inspections_performed,
        )
    }
}

fn percentage(part: i64, whole: i64) -> Option<Decimal> {
    if whole <= 0 {
        return None;
    }
    Some((Decimal::from(part) * Decimal::from(100) / Decimal::from(whole)).round_dp(2))
}

/// First and last day of a calendar month
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first.checked_add_months(Months::new(1))?.pred_opt()?;
    Some((first, last))
}

/// Spanish month name used in report headers
pub fn month_name_es(month: u32) -> &'static str {
    match month {
        1 => "Enero",
        2 => "Febrero",
        3 => "Marzo",
        4 => "Abril",
        5 => "Mayo",
        6 => "Junio",
        7 => "Julio",
        8 => "Agosto",
        9 => "Septiembre",
        10 => "Octubre",
        11 => "Noviembre",
        12 => "Diciembre",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_bounds() {
        let (first, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(first, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let (_, last) = month_bounds(2023, 12).unwrap();
        assert_eq!(last, NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        assert!(month_bounds(2023, 13).is_none());
    }

    #[test]
    fn test_rates() {
        let metrics = MonthlyMetrics {
            participants_trained: 40,
            participants_approved: 30,
            inspections_performed: 8,
            inspections_non_compliant: 2,
            ..Default::default()
        };
        assert_eq!(metrics.approval_rate(), Some(Decimal::from(75)));
        assert_eq!(metrics.inspection_compliance_rate(), Some(Decimal::from(75)));
        assert_eq!(MonthlyMetrics::default().approval_rate(), None);
    }
}
