//! Filter rule strings and their grammar.
//!
//! Grammar (case-insensitive, trimmed):
//!
//! - `name:<value>` - matches an item whose normalized display name equals
//!   the value
//! - `type:<value>` / `itemtype:<value>` / `objecttype:<value>` /
//!   `featuretype:<value>` - matches when the item's descriptor set for
//!   that axis contains the (alias-resolved) value
//! - a bare alias token (`class`, `weapon`, `misc`, ...) - resolved through
//!   the alias table to a descriptor rule
//! - anything else - a literal name match
//!
//! Empty rule strings parse to nothing and are dropped.

use super::alias::{resolve_alias, resolve_descriptor_prefix};

/// A descriptor classification axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorAxis {
    Type,
    ObjectType,
    FeatureType,
}

/// One parsed whitelist/blacklist rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    /// Matches an item whose normalized display name equals the value.
    Name(String),
    /// Matches an item whose descriptor set for `axis` contains `value`.
    Descriptor { axis: DescriptorAxis, value: String },
}

impl FilterRule {
    pub fn is_name(&self) -> bool {
        matches!(self, Self::Name(_))
    }
}

pub(crate) fn normalize_token(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Fold a raw value onto an axis: an alias for the same axis yields its
/// canonical value, anything else stays as the normalized token.
pub(crate) fn normalize_descriptor_value(axis: DescriptorAxis, value: &str) -> String {
    let normalized = normalize_token(value);
    if normalized.is_empty() {
        return normalized;
    }
    match resolve_alias(&normalized) {
        Some(alias) if alias.axis == axis => alias.value.to_string(),
        _ => normalized,
    }
}

fn parse_descriptor_rule(axis: DescriptorAxis, value: &str) -> Option<FilterRule> {
    let normalized = normalize_token(value);
    if normalized.is_empty() {
        return None;
    }

    // `type:weapon` should mean the same as the bare `weapon` alias even
    // though the alias lives on a different axis.
    if axis == DescriptorAxis::Type {
        if let Some(alias) = resolve_alias(&normalized) {
            return Some(FilterRule::Descriptor {
                axis: alias.axis,
                value: alias.value.to_string(),
            });
        }
    }

    let value = normalize_descriptor_value(axis, &normalized);
    if value.is_empty() {
        return None;
    }
    Some(FilterRule::Descriptor { axis, value })
}

fn parse_prefixed_rule(value: &str) -> Option<FilterRule> {
    let separator = value.find(':')?;
    if separator == 0 {
        return None;
    }
    let axis = resolve_descriptor_prefix(&value[..separator])?;
    parse_descriptor_rule(axis, &value[separator + 1..])
}

/// Parse one rule string; `None` for empty/unusable input.
pub fn parse_rule(raw: &str) -> Option<FilterRule> {
    let normalized = normalize_token(raw);
    if normalized.is_empty() {
        return None;
    }

    if let Some(rest) = normalized.strip_prefix("name:") {
        let name = normalize_token(rest);
        if name.is_empty() {
            return None;
        }
        return Some(FilterRule::Name(name));
    }

    if let Some(rule) = parse_prefixed_rule(&normalized) {
        return Some(rule);
    }

    if let Some(alias) = resolve_alias(&normalized) {
        return Some(FilterRule::Descriptor {
            axis: alias.axis,
            value: alias.value.to_string(),
        });
    }

    Some(FilterRule::Name(normalized))
}

/// Parse a rule list, dropping unusable entries.
pub fn parse_rules(raw: &[String]) -> Vec<FilterRule> {
    raw.iter().filter_map(|value| parse_rule(value)).collect()
}
