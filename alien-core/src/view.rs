//! View filter pipeline.
//!
//! Derives what a list screen renders from the cached collection and the
//! current filter state. Steps always run in the same order: access filter,
//! name search, field filters, stable sort. The input is never mutated.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::access::AccessPolicy;
use crate::error::ValidationError;
use crate::identity::User;
use crate::record::{ProjectRecord, NAME_FIELD};

/// Display order of project categories, used by the status sort.
pub const STATUS_ORDER: [&str; 5] = [
    "Launched",
    "Ready",
    "Almost Ready",
    "New / In Progress",
    "Stuck / On Hold",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// How values of the sort field compare.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKind {
    /// Case-insensitive string order.
    #[default]
    Text,
    Number,
    /// Parsed timestamps, not string order.
    Date,
    /// Position in the given list. Unlisted values count as missing.
    Ordinal(Vec<String>),
}

impl SortKind {
    pub fn status() -> Self {
        SortKind::Ordinal(STATUS_ORDER.iter().map(|s| s.to_string()).collect())
    }
}

impl FromStr for SortKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "name" => Ok(SortKind::Text),
            "number" => Ok(SortKind::Number),
            "date" => Ok(SortKind::Date),
            "status" => Ok(SortKind::status()),
            other => Err(ValidationError::UnknownSortKind {
                kind: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    /// Field path, dots allowed (`stats.last_active`).
    pub key: String,
    #[serde(default)]
    pub kind: SortKind,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(key: impl Into<String>, kind: SortKind, direction: SortDirection) -> Self {
        Self {
            key: key.into(),
            kind,
            direction,
        }
    }

    /// Most recently active first, the projects page default.
    pub fn last_updated() -> Self {
        Self::new("stats.last_active", SortKind::Date, SortDirection::Desc)
    }

    pub fn by_name() -> Self {
        Self::new(NAME_FIELD, SortKind::Text, SortDirection::Asc)
    }

    pub fn by_status() -> Self {
        Self::new("category", SortKind::status(), SortDirection::Asc)
    }
}

/// Everything a list screen lets the user tweak.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterState {
    #[serde(default)]
    pub search_term: String,
    #[serde(default)]
    pub field_filters: BTreeMap<String, Value>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl FilterState {
    pub fn with_search(mut self, term: impl Into<String>) -> Self {
        self.search_term = term.into();
        self
    }

    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.field_filters.insert(field.into(), value.into());
        self
    }

    pub fn with_sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Number of user-set constraints, for the "clear filters" badge.
    pub fn active_filter_count(&self) -> usize {
        usize::from(!self.search_term.trim().is_empty()) + self.field_filters.len()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// The access-filter, search, filter, sort pipeline.
#[derive(Debug, Clone)]
pub struct ViewPipeline {
    policy: AccessPolicy,
    name_field: String,
}

impl ViewPipeline {
    pub fn new(policy: AccessPolicy) -> Self {
        Self {
            policy,
            name_field: NAME_FIELD.to_string(),
        }
    }

    pub fn with_name_field(mut self, field: impl Into<String>) -> Self {
        self.name_field = field.into();
        self
    }

    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Records visible to `user` before any user-set filter.
    pub fn visible<'a>(
        &self,
        collection: &'a [ProjectRecord],
        user: Option<&User>,
    ) -> Vec<&'a ProjectRecord> {
        collection
            .iter()
            .filter(|record| self.policy.can_access(user, Some(*record)))
            .collect()
    }

    /// Run all four steps. Same inputs always give the same output.
    pub fn project<'a>(
        &self,
        collection: &'a [ProjectRecord],
        user: Option<&User>,
        filter: &FilterState,
    ) -> Vec<&'a ProjectRecord> {
        let mut rows = self.visible(collection, user);

        let needle = filter.search_term.trim().to_lowercase();
        if !needle.is_empty() {
            rows.retain(|record| {
                record
                    .get(&self.name_field)
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            });
        }

        for (field, expected) in &filter.field_filters {
            rows.retain(|record| record.lookup(field).as_ref() == Some(expected));
        }

        if let Some(sort) = &filter.sort {
            // Vec::sort_by is stable.
            rows.sort_by(|a, b| compare_records(a, b, sort));
        }
        rows
    }

    /// Distinct non-empty string values of `field` among visible records,
    /// sorted, for filter dropdowns.
    pub fn distinct_values(
        &self,
        collection: &[ProjectRecord],
        user: Option<&User>,
        field: &str,
    ) -> Vec<String> {
        let mut values: Vec<String> = self
            .visible(collection, user)
            .into_iter()
            .filter_map(|record| match record.lookup(field) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
                _ => None,
            })
            .collect();
        values.sort();
        values.dedup();
        values
    }

    /// Count of visible records per value of `field`, for tab badges.
    pub fn count_by(
        &self,
        collection: &[ProjectRecord],
        user: Option<&User>,
        field: &str,
    ) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for record in self.visible(collection, user) {
            if let Some(Value::String(value)) = record.lookup(field) {
                *counts.entry(value).or_insert(0) += 1;
            }
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, PartialOrd)]
enum SortValue {
    Text(String),
    Number(f64),
    Date(DateTime<Utc>),
    Rank(usize),
}

fn sort_value(record: &ProjectRecord, spec: &SortSpec) -> Option<SortValue> {
    let value = record.lookup(&spec.key)?;
    match (&spec.kind, value) {
        (_, Value::Null) => None,
        (SortKind::Text, Value::String(s)) => Some(SortValue::Text(s.to_lowercase())),
        (SortKind::Text, other) => Some(SortValue::Text(other.to_string().to_lowercase())),
        (SortKind::Number, Value::Number(n)) => n.as_f64().map(SortValue::Number),
        (SortKind::Number, Value::String(s)) => s.trim().parse().ok().map(SortValue::Number),
        (SortKind::Number, _) => None,
        (SortKind::Date, Value::String(s)) => parse_timestamp(&s).map(SortValue::Date),
        (SortKind::Date, _) => None,
        (SortKind::Ordinal(order), Value::String(s)) => {
            order.iter().position(|o| o == &s).map(SortValue::Rank)
        }
        (SortKind::Ordinal(_), _) => None,
    }
}

/// Missing values sort last in both directions.
fn compare_records(a: &ProjectRecord, b: &ProjectRecord, spec: &SortSpec) -> Ordering {
    match (sort_value(a, spec), sort_value(b, spec)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => {
            let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            match spec.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        }
    }
}

/// Parse RFC 3339, a naive datetime (assumed UTC), or a plain date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
