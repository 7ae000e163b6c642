//! Configuration records and the two-tier merge engine.
//!
//! A world-level [`GlobalConfig`] maps trigger item names to candidate forms
//! and default item filters. A per-player [`PlayerOverrideConfig`] patches
//! individual mappings by id (never creates new ones). The merge engine
//! combines the two into an [`EffectiveConfig`] on demand; nothing effective
//! is ever persisted.

mod defaults;
mod merge;
mod migrate;
mod normalize;
mod types;

pub use defaults::default_form_filters;
pub use merge::merge_effective_config;
pub use migrate::{migrate_global_config, migrate_player_override, MigrationOutcome};
pub use normalize::{
    normalize_filters, normalize_form_ref, normalize_form_refs, normalize_global_config,
    normalize_player_override, normalize_string, normalize_string_list,
};
pub use types::{
    AbilityFilters, EffectiveConfig, EffectiveMapping, FormMapping, FormRef, FormRefMode,
    GlobalConfig, GlobalPermissions, GlobalUi, MappingTrigger, PlayerOverrideConfig,
    PlayerOverrideMapping, TriggerMode,
};
