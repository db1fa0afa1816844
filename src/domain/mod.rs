//! Domain layer for Tacit
//!
//! This module contains the pure types of the verification pipeline and the
//! port the browser automation collaborator implements.

pub mod errors;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use errors::{DomainError, DomainResult, DriverError};
