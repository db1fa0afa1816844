//! Infrastructure layer module
//!
//! Adapters and ambient services around the verification pipeline:
//! - Configuration management
//! - Logging infrastructure
//! - Scripted browser driver
//! - Run artifact output
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod artifacts;
pub mod browser;
pub mod config;
pub mod logging;
