//! Personal protective equipment (EPP) inspection models

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// Condition of a piece of equipment at inspection time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EppCondition {
    Good,
    Fair,
    Bad,
}

impl EppCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            EppCondition::Good => "good",
            EppCondition::Fair => "fair",
            EppCondition::Bad => "bad",
        }
    }

    pub fn display_name_es(&self) -> &'static str {
        match self {
            EppCondition::Good => "Bueno",
            EppCondition::Fair => "Regular",
            EppCondition::Bad => "Malo",
        }
    }

    /// Equipment in bad condition must be replaced
    pub fn requires_replacement(&self) -> bool {
        matches!(self, EppCondition::Bad)
    }

    /// Parse a spreadsheet cell.
    ///
    /// Returns `Ok(None)` for cells marking the equipment as not evaluated
    /// (blank, `N/A`, `NA`, `-`, `NO APLICA`).
    pub fn parse_cell(raw: &str) -> Result<Option<Self>, ParseEnumError> {
        let value = raw.trim().to_uppercase();
        match value.as_str() {
            "" | "-" | "NA" | "N/A" | "N.A." | "NO APLICA" => Ok(None),
            "B" | "BUENO" | "BUENA" | "GOOD" | "OK" | "CONFORME" | "C" => {
                Ok(Some(EppCondition::Good))
            }
            "R" | "REGULAR" | "FAIR" => Ok(Some(EppCondition::Fair)),
            "M" | "MALO" | "MALA" | "BAD" | "NO CONFORME" | "NC" => Ok(Some(EppCondition::Bad)),
            _ => Err(ParseEnumError::new("EPP condition", raw.trim())),
        }
    }
}
