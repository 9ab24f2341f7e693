//! Workplace inspection models

use serde::{Deserialize, Serialize};

use super::ParseEnumError;

/// What was inspected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InspectionType {
    Workplace,
    Equipment,
    Vehicle,
    FireExtinguisher,
    FirstAidKit,
    Other,
}

impl InspectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionType::Workplace => "workplace",
            InspectionType::Equipment => "equipment",
            InspectionType::Vehicle => "vehicle",
            InspectionType::FireExtinguisher => "fire_extinguisher",
            InspectionType::FirstAidKit => "first_aid_kit",
            InspectionType::Other => "other",
        }
    }

    pub fn display_name_es(&self) -> &'static str {
        match self {
            InspectionType::Workplace => "Área de trabajo",
            InspectionType::Equipment => "Equipos y herramientas",
            InspectionType::Vehicle => "Vehículos",
            InspectionType::FireExtinguisher => "Extintores",
            InspectionType::FirstAidKit => "Botiquín",
            InspectionType::Other => "Otros",
        }
    }
}

/// Outcome of an inspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(type_name = "VARCHAR", rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum InspectionResult {
    Compliant,
    Observed,
    NonCompliant,
}

impl InspectionResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            InspectionResult::Compliant => "compliant",
            InspectionResult::Observed => "observed",
            InspectionResult::NonCompliant => "non_compliant",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ParseEnumError> {
        match s {
            "compliant" => Ok(InspectionResult::Compliant),
            "observed" => Ok(InspectionResult::Observed),
            "non_compliant" => Ok(InspectionResult::NonCompliant),
            _ => Err(ParseEnumError::new("inspection result", s)),
        }
    }

    /// Observed and non-compliant findings must carry a corrective action
    pub fn requires_corrective_action(&self) -> bool {
        !matches!(self, InspectionResult::Compliant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrective_action_requirement() {
        assert!(!InspectionResult::Compliant.requires_corrective_action());
        assert!(InspectionResult::Observed.requires_corrective_action());
        assert!(InspectionResult::NonCompliant.requires_corrective_action());
    }
}
