//! Domain models for the SST Training Management Platform

mod certificate;
mod collaborator;
mod epp;
mod inspection;
mod report;
mod training;
mod user;

pub use certificate::*;
pub use collaborator::*;
pub use epp::*;
pub use inspection::*;
pub use report::*;
pub use training::*;
pub use user::*;

/// Error returned when a stored or submitted code does not name a known variant
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
