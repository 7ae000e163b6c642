//! Configuration normalization.
//!
//! Edits arrive from authoring surfaces and persisted payloads in whatever
//! state the host left them; normalization trims strings, deduplicates, and
//! drops entries that fail the mapping validity invariant (non-empty id,
//! trigger, and at least one form ref). All functions are pure and return
//! new records.

use super::defaults::default_form_filters;
use super::types::{
    AbilityFilters, FormMapping, FormRef, GlobalConfig, GlobalPermissions, GlobalUi,
    MappingTrigger, PlayerOverrideConfig, PlayerOverrideMapping,
};

pub fn normalize_string(value: &str) -> String {
    value.trim().to_string()
}

/// Trim entries, drop empties, dedup preserving first-seen order.
pub fn normalize_string_list(values: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for value in values {
        let normalized = normalize_string(value);
        if normalized.is_empty() || seen.contains(&normalized) {
            continue;
        }
        seen.push(normalized);
    }
    seen
}

pub fn normalize_form_ref(form_ref: &FormRef) -> FormRef {
    FormRef {
        mode: form_ref.mode,
        value: normalize_string(&form_ref.value),
    }
}

/// Normalize and dedup by ref key. On a key collision the later entry wins
/// while keeping the earlier entry's position.
pub fn normalize_form_refs(form_refs: &[FormRef]) -> Vec<FormRef> {
    let mut deduped: Vec<(String, FormRef)> = Vec::new();
    for form_ref in form_refs {
        let normalized = normalize_form_ref(form_ref);
        let key = normalized.key();
        match deduped.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = normalized,
            None => deduped.push((key, normalized)),
        }
    }
    deduped.into_iter().map(|(_, form_ref)| form_ref).collect()
}

pub fn normalize_filters(filters: &AbilityFilters) -> AbilityFilters {
    AbilityFilters {
        whitelist: normalize_string_list(&filters.whitelist),
        blacklist: normalize_string_list(&filters.blacklist),
    }
}

fn normalize_filters_with_defaults(filters: &AbilityFilters) -> AbilityFilters {
    let normalized = normalize_filters(filters);
    let defaults = default_form_filters();
    AbilityFilters {
        whitelist: if normalized.whitelist.is_empty() {
            defaults.whitelist
        } else {
            normalized.whitelist
        },
        blacklist: if normalized.blacklist.is_empty() {
            defaults.blacklist
        } else {
            normalized.blacklist
        },
    }
}

fn normalize_mapping(mapping: &FormMapping) -> FormMapping {
    let form_ability_uuids = normalize_string_list(
        mapping.form_ability_uuids.as_deref().unwrap_or_default(),
    );
    FormMapping {
        id: normalize_string(&mapping.id),
        trigger: MappingTrigger {
            mode: mapping.trigger.mode,
            value: normalize_string(&mapping.trigger.value),
        },
        form_refs: normalize_form_refs(&mapping.form_refs),
        default_filters: normalize_filters_with_defaults(&mapping.default_filters),
        form_ability_uuids: if form_ability_uuids.is_empty() {
            None
        } else {
            Some(form_ability_uuids)
        },
    }
}

/// Normalize a global config, dropping mappings that fail the validity
/// invariant (empty id, empty trigger, or no form refs after trimming).
pub fn normalize_global_config(config: &GlobalConfig) -> GlobalConfig {
    GlobalConfig {
        version: config.version,
        mappings: config
            .mappings
            .iter()
            .map(normalize_mapping)
            .filter(|mapping| {
                !mapping.id.is_empty()
                    && !mapping.trigger.value.is_empty()
                    && !mapping.form_refs.is_empty()
            })
            .collect(),
        permissions: GlobalPermissions {
            player_override_editors: normalize_string_list(
                &config.permissions.player_override_editors,
            ),
        },
        ui: GlobalUi {
            show_debug_logs: config.ui.show_debug_logs,
            use_chat_fallback: config.ui.use_chat_fallback,
        },
    }
}

/// Normalize a player override, dropping patches with an empty id.
///
/// Override filters are intentionally NOT defaulted here: an override that
/// re-specifies empty lists is still an override.
pub fn normalize_player_override(config: &PlayerOverrideConfig) -> PlayerOverrideConfig {
    PlayerOverrideConfig {
        version: config.version,
        mappings: config
            .mappings
            .iter()
            .map(|mapping| PlayerOverrideMapping {
                id: normalize_string(&mapping.id),
                form_refs_add: normalize_form_refs(&mapping.form_refs_add),
                form_refs_remove: normalize_form_refs(&mapping.form_refs_remove),
                filters_override: mapping.filters_override.as_ref().map(normalize_filters),
            })
            .filter(|mapping| !mapping.id.is_empty())
            .collect(),
    }
}
