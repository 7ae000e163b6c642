//! Deterministic item selection.
//!
//! Applies a whitelist/blacklist pair to an item list and returns the ids
//! that survive, deduplicated and sorted so the same inputs always produce
//! the same list.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::config::AbilityFilters;
use crate::item::ItemRecord;

use super::descriptors::{classify, ItemDescriptors};
use super::rule::{normalize_token, parse_rules, FilterRule};

/// The trigger action's normalized item name. The action that initiates a
/// transform must never be strippable by filters, or the actor would lose
/// the ability to change back.
pub const TRIGGER_ACTION_NAME: &str = "wildshape";

/// Item types that make up a base actor's core identity.
const CORE_IDENTITY_TYPES: &[&str] = &["class", "subclass", "background", "ancestry"];
/// Feature types that make up a base actor's core identity.
const CORE_IDENTITY_FEATURE_TYPES: &[&str] = &["class", "background", "ancestry"];

/// Selection variants.
#[derive(Debug, Clone, Copy)]
pub struct SelectOptions {
    /// Whether already-injected items are candidates at all.
    pub include_injected: bool,
    /// Re-add core identity items (class/background/ancestry) regardless of
    /// filters; used when building the base actor's keep-list.
    pub preserve_core_identity: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self {
            include_injected: true,
            preserve_core_identity: false,
        }
    }
}

impl SelectOptions {
    /// Options for the base actor's keep-list: only ever consider
    /// non-injected items and preserve core identity.
    pub fn base_keep_list() -> Self {
        Self {
            include_injected: false,
            preserve_core_identity: true,
        }
    }
}

struct Classified<'a> {
    id: &'a str,
    name: String,
    descriptors: ItemDescriptors,
}

impl Classified<'_> {
    fn matches(&self, rule: &FilterRule) -> bool {
        match rule {
            FilterRule::Name(value) => self.name == *value,
            FilterRule::Descriptor { axis, value } => self.descriptors.contains(*axis, value),
        }
    }

    fn matches_any(&self, rules: &[FilterRule]) -> bool {
        rules.iter().any(|rule| self.matches(rule))
    }

    fn matches_any_name(&self, rules: &[FilterRule]) -> bool {
        rules
            .iter()
            .any(|rule| rule.is_name() && self.matches(rule))
    }

    fn is_trigger_action(&self) -> bool {
        self.name == TRIGGER_ACTION_NAME
    }

    fn is_core_identity(&self) -> bool {
        CORE_IDENTITY_TYPES
            .iter()
            .any(|candidate| self.descriptors.types.contains(*candidate))
            || CORE_IDENTITY_FEATURE_TYPES
                .iter()
                .any(|candidate| self.descriptors.feature_types.contains(*candidate))
    }
}

/// Select the ids of the items that pass the filters.
///
/// Policy, in order: items without a usable id (and, per options, injected
/// items) are dropped; a non-empty whitelist keeps only matching items; a
/// blacklist match removes an item unless a whitelist rule of kind `name`
/// also matches it (an explicit by-name whitelist beats a descriptor
/// blacklist, a descriptor whitelist does not); the trigger action and -
/// when requested - core identity items are re-added unconditionally.
/// The result is deduplicated by id and sorted lexicographically.
pub fn select_item_ids(
    items: &[Value],
    filters: &AbilityFilters,
    options: SelectOptions,
) -> Vec<String> {
    let whitelist = parse_rules(&filters.whitelist);
    let blacklist = parse_rules(&filters.blacklist);

    let eligible: Vec<Classified<'_>> = items
        .iter()
        .filter_map(|raw| {
            let item = ItemRecord::new(raw);
            let id = item.id()?;
            if !options.include_injected && item.is_injected() {
                return None;
            }
            Some(Classified {
                id,
                name: normalize_token(item.name()),
                descriptors: classify(&item),
            })
        })
        .collect();

    let mut selected: BTreeSet<&str> = eligible
        .iter()
        .filter(|item| whitelist.is_empty() || item.matches_any(&whitelist))
        .filter(|item| !item.matches_any(&blacklist) || item.matches_any_name(&whitelist))
        .map(|item| item.id)
        .collect();

    selected.extend(
        eligible
            .iter()
            .filter(|item| item.is_trigger_action())
            .map(|item| item.id),
    );

    if options.preserve_core_identity {
        selected.extend(
            eligible
                .iter()
                .filter(|item| item.is_core_identity())
                .map(|item| item.id),
        );
    }

    selected.into_iter().map(str::to_string).collect()
}

/// Convenience accessor used by plan builders: the raw items (not just ids)
/// that passed selection, in id order.
pub fn items_by_ids<'a>(items: &'a [Value], ids: &[String]) -> Vec<&'a Value> {
    ids.iter()
        .filter_map(|id| {
            items
                .iter()
                .find(|raw| ItemRecord::new(raw).id() == Some(id.as_str()))
        })
        .collect()
}
