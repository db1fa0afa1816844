//! Port trait definitions (Hexagonal Architecture)
//!
//! The browser automation driver is an external collaborator; the pipeline
//! only depends on the [`PageDriver`] contract defined here.

pub mod page_driver;

pub use page_driver::PageDriver;
