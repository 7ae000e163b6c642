//! The config merge engine.
//!
//! Combines the world config with one player's override into the effective
//! mapping list. Deterministic and side-effect-free: same inputs, same
//! output, in the same order.

use super::defaults::default_form_filters;
use super::types::{
    AbilityFilters, EffectiveConfig, EffectiveMapping, FormRef, GlobalConfig,
    PlayerOverrideConfig, PlayerOverrideMapping,
};

/// Global refs minus the removed keys, plus the added refs, deduped by ref
/// key. A later insertion wins the value slot on key collision while the
/// earlier position is kept.
fn merge_form_refs(
    global_refs: &[FormRef],
    refs_to_remove: &[FormRef],
    refs_to_add: &[FormRef],
) -> Vec<FormRef> {
    let remove_keys: Vec<String> = refs_to_remove.iter().map(FormRef::key).collect();
    let mut merged: Vec<(String, FormRef)> = Vec::new();

    for form_ref in global_refs {
        let key = form_ref.key();
        if remove_keys.contains(&key) {
            continue;
        }
        upsert(&mut merged, key, form_ref.clone());
    }
    for form_ref in refs_to_add {
        upsert(&mut merged, form_ref.key(), form_ref.clone());
    }

    merged.into_iter().map(|(_, form_ref)| form_ref).collect()
}

fn upsert(merged: &mut Vec<(String, FormRef)>, key: String, form_ref: FormRef) {
    match merged.iter_mut().find(|(existing, _)| *existing == key) {
        Some((_, slot)) => *slot = form_ref,
        None => merged.push((key, form_ref)),
    }
}

/// Empty filter lists fall back to the documented defaults, per list.
fn apply_default_filters(filters: &AbilityFilters) -> AbilityFilters {
    let defaults = default_form_filters();
    AbilityFilters {
        whitelist: if filters.whitelist.is_empty() {
            defaults.whitelist
        } else {
            filters.whitelist.clone()
        },
        blacklist: if filters.blacklist.is_empty() {
            defaults.blacklist
        } else {
            filters.blacklist.clone()
        },
    }
}

fn clone_form_ability_uuids(uuids: Option<&Vec<String>>) -> Option<Vec<String>> {
    uuids.filter(|uuids| !uuids.is_empty()).cloned()
}

/// Produce the effective mapping list for one player.
///
/// Overrides patch global mappings by id and can only patch: ids present
/// only in the override are ignored. `form_ability_uuids` pass through from
/// the global mapping unchanged; overrides cannot alter them.
pub fn merge_effective_config(
    global: &GlobalConfig,
    player_override: &PlayerOverrideConfig,
) -> EffectiveConfig {
    let override_for = |id: &str| -> Option<&PlayerOverrideMapping> {
        player_override
            .mappings
            .iter()
            .find(|mapping| mapping.id == id)
    };

    EffectiveConfig {
        version: global.version,
        mappings: global
            .mappings
            .iter()
            .map(|global_mapping| {
                let form_ability_uuids =
                    clone_form_ability_uuids(global_mapping.form_ability_uuids.as_ref());
                match override_for(&global_mapping.id) {
                    None => EffectiveMapping {
                        id: global_mapping.id.clone(),
                        trigger: global_mapping.trigger.clone(),
                        form_refs: global_mapping.form_refs.clone(),
                        filters: apply_default_filters(&global_mapping.default_filters),
                        form_ability_uuids,
                    },
                    Some(override_mapping) => EffectiveMapping {
                        id: global_mapping.id.clone(),
                        trigger: global_mapping.trigger.clone(),
                        form_refs: merge_form_refs(
                            &global_mapping.form_refs,
                            &override_mapping.form_refs_remove,
                            &override_mapping.form_refs_add,
                        ),
                        filters: apply_default_filters(
                            override_mapping
                                .filters_override
                                .as_ref()
                                .unwrap_or(&global_mapping.default_filters),
                        ),
                        form_ability_uuids,
                    },
                }
            })
            .collect(),
        permissions: global.permissions.clone(),
        ui: global.ui.clone(),
    }
}
