//! Browser driver adapters.
//!
//! Real browser automation lives outside this crate; the scripted driver
//! replays a declarative [`SiteModel`] for offline scans and tests.

pub mod scripted;
pub mod site_model;

pub use scripted::ScriptedPageDriver;
pub use site_model::{
    Effect, LoadingEffect, NetworkCall, ScriptedInteraction, ScriptedPage, SiteModel,
};
