//! Onboarding checklist phases.

use serde_json::{Map, Value};

/// Checklist items grouped by migration phase, in display order.
pub const CHECKLIST_PHASES: [(&str, &[&str]); 4] = [
    (
        "Phase 1: Onboarding",
        &[
            "Slack Setup",
            "Kickoff Scheduled",
            "Kickoff Completed",
            "Deliverables Sent",
            "Deliverables Completed",
        ],
    ),
    (
        "Phase 2: Migration & Setup",
        &[
            "Store Setup",
            "Access Sent",
            "Data Migration Started",
            "Data Migration Completed",
            "Theme Migration Started",
            "Theme Migration Completed",
            "App Setup Started",
            "App Setup Completed",
        ],
    ),
    (
        "Phase 3: Analytics & Tracking",
        &["GA4 Access", "GA4 Setup", "GTM Access", "GTM Setup", "Other Pixels", "CDN Access"],
    ),
    ("Phase 4: Launch", &["Ready to go Live", "Notifications turned on"]),
];

pub fn all_items() -> impl Iterator<Item = &'static str> {
    CHECKLIST_PHASES.iter().flat_map(|(_, items)| items.iter().copied())
}

/// Items ticked in a project's `checklist` object.
pub fn completed_count(checklist: Option<&Value>) -> usize {
    checklist
        .and_then(Value::as_object)
        .map(|map: &Map<String, Value>| map.values().filter(|v| is_truthy(v)).count())
        .unwrap_or(0)
}

/// Completed share of the known items, 0.0 to 1.0.
pub fn progress(checklist: Option<&Value>) -> f64 {
    let total = all_items().count();
    let Some(map) = checklist.and_then(Value::as_object) else {
        return 0.0;
    };
    let done = all_items()
        .filter(|item| map.get(*item).is_some_and(is_truthy))
        .count();
    done as f64 / total as f64
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
