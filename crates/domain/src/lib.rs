//! FormShift domain core.
//!
//! Pure, side-effect-free building blocks for the form-transform system:
//!
//! - `config` - authored configuration records, normalization, the
//!   global/player merge engine, and schema migration
//! - `filter` - the filter rule engine that classifies item records and
//!   decides which items accompany a transform
//! - `item` - a borrowed view over host item documents
//! - `snapshot` - actor snapshots, transform plans, and the persisted
//!   per-actor shape state
//!
//! Everything in this crate is deterministic and free of I/O; the async
//! orchestration lives in `formshift-engine`.

pub mod config;
pub mod error;
pub mod filter;
pub mod item;
pub mod snapshot;

pub use config::{
    default_form_filters, merge_effective_config, migrate_global_config, migrate_player_override,
    normalize_global_config, normalize_player_override, AbilityFilters, EffectiveConfig,
    EffectiveMapping, FormMapping, FormRef, FormRefMode, GlobalConfig, GlobalPermissions, GlobalUi,
    MappingTrigger, MigrationOutcome, PlayerOverrideConfig, PlayerOverrideMapping, TriggerMode,
};
pub use error::DomainError;
pub use filter::{
    classify, parse_rule, parse_rules, select_item_ids, DescriptorAxis, FilterRule,
    ItemDescriptors, SelectOptions, TRIGGER_ACTION_NAME,
};
pub use item::{injected_item_payload, strip_item_ids, ItemRecord};
pub use snapshot::{ActorShapeState, ActorSnapshot, ActorUpdate, TransformPlan};

/// Flag scope under which this system stores its persisted payloads.
pub const FLAG_SCOPE: &str = "formshift";

/// Flag scope used by earlier releases; still honored on reads.
pub const LEGACY_FLAG_SCOPE: &str = "wildshape";

/// Current schema version for every persisted payload.
pub const SCHEMA_VERSION: u32 = 1;
