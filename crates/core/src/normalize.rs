//! Normalization of loosely-typed storage values into closed enums.
//!
//! Persisted rows come from several producers that never agreed on casing
//! or vocabulary (`"P0"`, `"urgent"`, `"positive"`, `"in-progress"`). Each
//! mapping here is exhaustive over the known synonyms and falls back to a
//! neutral default for anything else. These functions never fail.

use crate::contract::{DecisionStatus, Domain, FactStatus, Grain, Severity, Trend};

/// Lowercase, trim, and fold `-` and spaces into `_`.
fn fold(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| match c {
            '-' | ' ' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Unknown → `Medium`.
pub fn map_severity(raw: &str) -> Severity {
    match fold(raw).as_str() {
        "critical" | "crit" | "p0" | "urgent" | "blocker" | "sev0" | "sev1" => Severity::Critical,
        "high" | "p1" | "major" | "sev2" => Severity::High,
        "medium" | "med" | "p2" | "normal" | "moderate" | "sev3" => Severity::Medium,
        "low" | "p3" | "p4" | "minor" | "info" | "sev4" => Severity::Low,
        _ => Severity::Medium,
    }
}

/// Unknown → `None`.
pub fn map_trend(raw: &str) -> Option<Trend> {
    match fold(raw).as_str() {
        "up" | "positive" | "increasing" | "increase" | "rising" | "improving" => Some(Trend::Up),
        "down" | "negative" | "decreasing" | "decrease" | "falling" | "declining" => {
            Some(Trend::Down)
        }
        "flat" | "stable" | "neutral" | "unchanged" | "0" => Some(Trend::Flat),
        _ => None,
    }
}

/// Unknown → `Neutral`.
pub fn map_fact_status(raw: &str) -> FactStatus {
    match fold(raw).as_str() {
        "good" | "ok" | "healthy" | "success" | "green" | "positive" => FactStatus::Good,
        "warning" | "warn" | "caution" | "amber" | "yellow" => FactStatus::Warning,
        "bad" | "critical" | "danger" | "error" | "red" | "negative" => FactStatus::Bad,
        _ => FactStatus::Neutral,
    }
}

/// Unknown → `Open`, so an unreadable status is shown rather than hidden.
pub fn map_status(raw: &str) -> DecisionStatus {
    match fold(raw).as_str() {
        "open" | "new" | "pending" | "active" => DecisionStatus::Open,
        "in_progress" | "inprogress" | "assigned" | "acknowledged" => DecisionStatus::InProgress,
        "snoozed" | "deferred" => DecisionStatus::Snoozed,
        "escalated" => DecisionStatus::Escalated,
        "decided" | "resolved" | "done" | "closed" | "approved" => DecisionStatus::Decided,
        "dismissed" | "rejected" | "ignored" => DecisionStatus::Dismissed,
        _ => DecisionStatus::Open,
    }
}

pub fn map_domain(raw: &str) -> Option<Domain> {
    match fold(raw).as_str() {
        "fdp" | "finance" => Some(Domain::Fdp),
        "mdp" | "marketing" => Some(Domain::Mdp),
        "cdp" | "customer" => Some(Domain::Cdp),
        "control_tower" | "controltower" | "ct" => Some(Domain::ControlTower),
        _ => None,
    }
}

/// Unknown → `Tenant`.
pub fn map_grain(raw: &str) -> Grain {
    match fold(raw).as_str() {
        "channel" => Grain::Channel,
        "sku" | "product" | "item" => Grain::Sku,
        "customer" | "account" => Grain::Customer,
        "segment" => Grain::Segment,
        "campaign" => Grain::Campaign,
        "order" => Grain::Order,
        "store" | "location" => Grain::Store,
        "cohort" => Grain::Cohort,
        _ => Grain::Tenant,
    }
}
