// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! WHERE-style predicate model and selector construction.
//!
//! Conditions are passive data: the SQL translator and the textual WHERE
//! helper produce them, the list operation turns them into label/field
//! selector strings pushed to the API and applies ordering, offset and limit
//! client-side.
//!
//! ## Field selector basics
//!
//! The Kubernetes API only accepts `=` filtering on a small set of built-in
//! fields. Which keys qualify is a closed, hardcoded allow-list; extending it
//! is a maintenance task, not a runtime decision. Everything outside the
//! allow-list is treated as an object label.

use std::sync::LazyLock;

use kube::api::DynamicObject;
use serde_json::Value;

use crate::error::{Error, Result};

/// Comparison operator of a condition. Only equality is translatable to
/// Kubernetes selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompareOp {
    /// Equals operator (=)
    Eq,
}

/// How a condition combines with the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

/// Detected type of a condition's literal value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Int,
    Bool,
}

/// A single `field = value` predicate
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Dotted field path or label key (e.g. "status.phase", "app")
    pub field: String,
    pub op: CompareOp,
    /// Canonical text of the value after type detection
    pub value: String,
    pub kind: ValueKind,
    /// Combinator joining this condition to the previous one
    pub logic: LogicOp,
    /// Parenthesis nesting depth in the source predicate
    pub depth: u32,
}

/// Accumulated list shaping for one statement
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Ordered predicates; insertion order is evaluation order
    pub conditions: Vec<Condition>,
    /// Client-side ordering, e.g. "metadata.name" or "metadata.name desc"
    pub order: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Label/field selector strings ready for a list request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selectors {
    pub labels: Option<String>,
    pub fields: Option<String>,
}

/// Field paths the API server accepts as field selectors.
///
/// Initialized once on first access; lookups happen on every list request.
static FIELD_SELECTOR_KEYS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        "metadata.name",
        "metadata.namespace",
        "status.phase",
        "spec.nodeName",
    ]
});

/// Check whether a key routes to a field selector rather than a label selector
pub fn is_field_selector_key(key: &str) -> bool {
    FIELD_SELECTOR_KEYS.contains(&key)
}

/// Classify a raw literal into {int, bool, string}.
///
/// Returns the detected kind together with the canonical text of the value.
/// Detection is total: anything that is neither an integer nor a boolean is a
/// string. Re-detecting the canonical text yields the same kind.
pub fn detect_value(raw: &str) -> (ValueKind, String) {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return (ValueKind::Int, n.to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => (ValueKind::Bool, "true".to_string()),
        "false" => (ValueKind::Bool, "false".to_string()),
        _ => (ValueKind::String, trimmed.to_string()),
    }
}

impl Filter {
    /// Build label/field selector strings from the accumulated conditions.
    ///
    /// Selectors are AND-only on the API side. Conditions reached through an
    /// OR combinator cannot be pushed down and fail the whole build so the
    /// caller never observes a silently-narrowed result set.
    pub fn selectors(&self) -> Result<Selectors> {
        let mut labels: Vec<String> = Vec::new();
        let mut fields: Vec<String> = Vec::new();

        for cond in &self.conditions {
            if cond.logic == LogicOp::Or {
                return Err(Error::UnsupportedOrPredicate);
            }
            let entry = format!("{}={}", cond.field, cond.value);
            if is_field_selector_key(&cond.field) {
                fields.push(entry);
            } else {
                labels.push(entry);
            }
        }

        Ok(Selectors {
            labels: join_nonempty(labels),
            fields: join_nonempty(fields),
        })
    }
}

fn join_nonempty(parts: Vec<String>) -> Option<String> {
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(","))
    }
}

/// Merge an optional selector string with another, comma-joining both halves
pub(crate) fn merge_selector(existing: Option<String>, added: Option<String>) -> Option<String> {
    match (existing, added) {
        (Some(a), Some(b)) => Some(format!("{},{}", a, b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// Look up a dotted path inside a JSON value
fn json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

/// Apply ordering, offset and limit to a fetched item list.
///
/// The API has no offset and no ordering, so this always runs client-side
/// after the selectors narrowed the set server-side. Values at the order path
/// compare numerically when both sides parse as numbers, as text otherwise;
/// a trailing `desc` reverses the order.
pub(crate) fn apply_shaping(mut items: Vec<DynamicObject>, filter: &Filter) -> Vec<DynamicObject> {
    if let Some(order) = filter.order.as_deref() {
        let (path, descending) = parse_order(order);
        let mut keyed: Vec<(String, DynamicObject)> = items
            .into_iter()
            .map(|item| {
                let key = serde_json::to_value(&item)
                    .ok()
                    .and_then(|v| json_path(&v, &path).map(scalar_text))
                    .unwrap_or_default();
                (key, item)
            })
            .collect();
        keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b));
        if descending {
            keyed.reverse();
        }
        items = keyed.into_iter().map(|(_, item)| item).collect();
    }

    let offset = filter.offset.unwrap_or(0);
    if offset > 0 {
        items = items.into_iter().skip(offset).collect();
    }
    if let Some(limit) = filter.limit {
        items.truncate(limit);
    }
    items
}

fn parse_order(order: &str) -> (String, bool) {
    let mut parts = order.split_whitespace();
    let path = parts.next().unwrap_or_default().to_string();
    let descending = parts
        .next()
        .is_some_and(|d| d.eq_ignore_ascii_case("desc"));
    (path, descending)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_keys(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(field: &str, value: &str, logic: LogicOp) -> Condition {
        let (kind, value) = detect_value(value);
        Condition {
            field: field.to_string(),
            op: CompareOp::Eq,
            value,
            kind,
            logic,
            depth: 0,
        }
    }

    #[test]
    fn test_detect_value_total() {
        assert_eq!(detect_value("123"), (ValueKind::Int, "123".to_string()));
        assert_eq!(detect_value("true"), (ValueKind::Bool, "true".to_string()));
        assert_eq!(detect_value("False"), (ValueKind::Bool, "false".to_string()));
        assert_eq!(detect_value("abc"), (ValueKind::String, "abc".to_string()));
        // ambiguous values stay strings
        assert_eq!(detect_value("1.5.3"), (ValueKind::String, "1.5.3".to_string()));
    }

    #[test]
    fn test_detect_value_round_trip() {
        for raw in ["123", "true", "abc", "-7", "FALSE"] {
            let (kind, canonical) = detect_value(raw);
            let (kind2, canonical2) = detect_value(&canonical);
            assert_eq!(kind, kind2);
            assert_eq!(canonical, canonical2);
        }
    }

    #[test]
    fn test_allow_list_is_closed() {
        assert!(is_field_selector_key("metadata.name"));
        assert!(is_field_selector_key("metadata.namespace"));
        assert!(is_field_selector_key("status.phase"));
        assert!(is_field_selector_key("spec.nodeName"));
        assert!(!is_field_selector_key("app"));
        assert!(!is_field_selector_key("status.podIP"));
    }

    #[test]
    fn test_selectors_classification() {
        let filter = Filter {
            conditions: vec![
                cond("app", "nginx", LogicOp::And),
                cond("metadata.name", "web-0", LogicOp::And),
                cond("status.phase", "Running", LogicOp::And),
            ],
            ..Default::default()
        };
        let sel = filter.selectors().unwrap();
        assert_eq!(sel.labels.as_deref(), Some("app=nginx"));
        assert_eq!(
            sel.fields.as_deref(),
            Some("metadata.name=web-0,status.phase=Running")
        );
    }

    #[test]
    fn test_selectors_reject_or() {
        let filter = Filter {
            conditions: vec![
                cond("app", "nginx", LogicOp::And),
                cond("app", "redis", LogicOp::Or),
            ],
            ..Default::default()
        };
        assert!(matches!(
            filter.selectors(),
            Err(Error::UnsupportedOrPredicate)
        ));
    }

    #[test]
    fn test_apply_shaping_order_and_slice() {
        let items: Vec<DynamicObject> = ["c", "a", "b"]
            .iter()
            .map(|name| {
                serde_json::from_value(serde_json::json!({
                    "metadata": { "name": name }
                }))
                .unwrap()
            })
            .collect();

        let filter = Filter {
            order: Some("metadata.name".to_string()),
            offset: Some(1),
            limit: Some(1),
            ..Default::default()
        };
        let shaped = apply_shaping(items, &filter);
        assert_eq!(shaped.len(), 1);
        assert_eq!(shaped[0].metadata.name.as_deref(), Some("b"));
    }

    #[test]
    fn test_apply_shaping_numeric_desc() {
        let items: Vec<DynamicObject> = ["2", "10", "1"]
            .iter()
            .map(|n| {
                serde_json::from_value(serde_json::json!({
                    "metadata": { "name": format!("pod-{n}") },
                    "spec": { "priority": n }
                }))
                .unwrap()
            })
            .collect();

        let filter = Filter {
            order: Some("spec.priority desc".to_string()),
            ..Default::default()
        };
        let shaped = apply_shaping(items, &filter);
        let names: Vec<_> = shaped
            .iter()
            .map(|o| o.metadata.name.clone().unwrap())
            .collect();
        assert_eq!(names, vec!["pod-10", "pod-2", "pod-1"]);
    }
}
