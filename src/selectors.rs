// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Label selector evaluation.
//!
//! Follows Kubernetes semantics: every `matchLabels` entry and every
//! `matchExpressions` requirement must hold, and an empty selector matches
//! every label set. Malformed selectors are reported instead of silently
//! matching nothing.

use crate::error::{ResolverError, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::BTreeMap;

/// Check whether `labels` satisfy `selector`
pub fn matches(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> Result<bool> {
    let mut matched = true;

    if let Some(match_labels) = &selector.match_labels {
        for (key, value) in match_labels {
            validate_key(key)?;
            if labels.get(key) != Some(value) {
                matched = false;
            }
        }
    }

    if let Some(match_expressions) = &selector.match_expressions {
        for expr in match_expressions {
            if !requirement_matches(expr, labels)? {
                matched = false;
            }
        }
    }

    Ok(matched)
}

/// Check whether `labels` satisfy at least one of `selectors`
pub fn matches_any(selectors: &[LabelSelector], labels: &BTreeMap<String, String>) -> Result<bool> {
    for selector in selectors {
        if matches(selector, labels)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluate an optional selector; an absent selector selects nothing
pub fn matches_optional(
    selector: Option<&LabelSelector>,
    labels: &BTreeMap<String, String>,
) -> Result<bool> {
    match selector {
        Some(selector) => matches(selector, labels),
        None => Ok(false),
    }
}

fn requirement_matches(
    expr: &LabelSelectorRequirement,
    labels: &BTreeMap<String, String>,
) -> Result<bool> {
    validate_key(&expr.key)?;
    let label_value = labels.get(&expr.key);
    let values = expr.values.as_deref().unwrap_or_default();

    match expr.operator.as_str() {
        "In" | "NotIn" if values.is_empty() => Err(ResolverError::InvalidSelector(format!(
            "operator {} on key {:?} requires at least one value",
            expr.operator, expr.key
        ))),
        "In" => Ok(label_value.is_some_and(|v| values.contains(v))),
        "NotIn" => Ok(label_value.map_or(true, |v| !values.contains(v))),
        "Exists" | "DoesNotExist" if !values.is_empty() => {
            Err(ResolverError::InvalidSelector(format!(
                "operator {} on key {:?} must not have values",
                expr.operator, expr.key
            )))
        }
        "Exists" => Ok(label_value.is_some()),
        "DoesNotExist" => Ok(label_value.is_none()),
        other => Err(ResolverError::InvalidSelector(format!(
            "unknown operator {:?} on key {:?}",
            other, expr.key
        ))),
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(ResolverError::InvalidSelector(
            "label key must not be empty".to_string(),
        ));
    }
    Ok(())
}
