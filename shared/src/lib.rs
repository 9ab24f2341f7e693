//! Shared types and models for the SST Training Management Platform
//!
//! This crate contains domain rules shared between the backend, the browser
//! forms (via WASM), and other components of the system.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
