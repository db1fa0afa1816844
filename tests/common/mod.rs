//! Shared fixtures for integration tests.
//!
//! Provides a small scripted shop site, a fast budget and a one-call scan
//! helper, so each test only states what differs.
#![allow(dead_code)]

use std::sync::Arc;

use tacit::domain::models::{
    BudgetOverrides, BudgetProfile, FeedbackMarkers, Flow, InteractionDescriptor, InteractionKind,
};
use tacit::infrastructure::browser::{
    Effect, LoadingEffect, NetworkCall, ScriptedInteraction, ScriptedPage, ScriptedPageDriver,
    SiteModel,
};
use tacit::{Config, Expectation, ScanBudget, ScanOrchestrator, ScanReport};

pub const START: &str = "https://shop.test/";

/// Quick profile with short settle windows.
pub fn fast_budget() -> ScanBudget {
    ScanBudget::build(
        BudgetProfile::Quick,
        &BudgetOverrides {
            settle_timeout_ms: Some(2_000),
            settle_idle_ms: Some(200),
            settle_dom_stable_ms: Some(200),
            stabilization_sample_mid_ms: Some(50),
            ..Default::default()
        },
    )
    .expect("fast budget is valid")
}

pub fn toast() -> FeedbackMarkers {
    FeedbackMarkers {
        toasts: 1,
        ..Default::default()
    }
}

pub fn link(selector: &str, href: &str) -> ScriptedInteraction {
    ScriptedInteraction::new(InteractionDescriptor::new(InteractionKind::Link, selector).with_href(href))
}

pub fn button(selector: &str, text: &str) -> ScriptedInteraction {
    ScriptedInteraction::new(InteractionDescriptor::new(InteractionKind::Button, selector).with_text(text))
}

/// Home page with a working link, a working save button and a pay button.
pub fn home_page() -> ScriptedPage {
    ScriptedPage::new(START)
        .with_interaction(link("a.about", "/about"))
        .with_interaction(
            button("#save", "Save").with_effect(
                Effect::dom("saved")
                    .with_feedback(toast())
                    .with_network(NetworkCall::new("https://shop.test/api/save", Some(200)).with_method("POST")),
            ),
        )
        .with_interaction(button("#pay", "Pay now"))
}

pub fn about_page() -> ScriptedPage {
    ScriptedPage::new("https://shop.test/about")
}

/// A site whose every promise produces an observable outcome.
pub fn clean_site() -> SiteModel {
    SiteModel::new(vec![home_page(), about_page()])
}

/// [`clean_site`] plus a subscribe button that does nothing at all.
pub fn silent_site() -> SiteModel {
    let home = home_page().with_interaction(button("#subscribe", "Subscribe"));
    SiteModel::new(vec![home, about_page()])
}

/// A site with a spinner that never goes away.
pub fn phantom_loading_site() -> SiteModel {
    let home = ScriptedPage::new(START).with_interaction(button("#refresh", "Refresh").with_effect(
        Effect {
            loading: Some(LoadingEffect {
                indicators: 1,
                resolve_after_ms: None,
            }),
            ..Default::default()
        },
    ));
    SiteModel::new(vec![home])
}

pub fn working_expectations() -> Vec<Expectation> {
    vec![
        Expectation::new("nav-about", "navigation").with_selector("a.about"),
        Expectation::new("save-toast", "feedback").with_selector("#save"),
    ]
}

pub async fn scan(site: SiteModel, expectations: &[Expectation]) -> ScanReport {
    scan_with(site, expectations, Config::default()).await
}

pub async fn scan_with(site: SiteModel, expectations: &[Expectation], config: Config) -> ScanReport {
    let driver = Arc::new(ScriptedPageDriver::new(site));
    ScanOrchestrator::new(driver, fast_budget(), config)
        .run(START, expectations)
        .await
        .expect("scan input is valid")
}

/// Scan [`START`] and then run `flows`.
pub async fn scan_flows(site: SiteModel, expectations: &[Expectation], flows: &[Flow]) -> ScanReport {
    let driver = Arc::new(ScriptedPageDriver::new(site));
    ScanOrchestrator::new(driver, fast_budget(), Config::default())
        .run_with_flows(START, expectations, flows)
        .await
        .expect("scan input is valid")
}

pub fn verdict_status(report: &ScanReport, id: &str) -> Option<tacit::VerdictStatus> {
    report
        .verdicts
        .iter()
        .find(|v| v.expectation_id.as_deref() == Some(id))
        .map(|v| v.status)
}
