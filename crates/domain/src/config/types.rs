//! Configuration record types.
//!
//! All persisted shapes serialize camelCase and carry an explicit integer
//! schema `version` so payloads written by newer builds can be rejected
//! instead of silently misread.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::SCHEMA_VERSION;

/// How a [`FormRef`] identifies its candidate form actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormRefMode {
    /// By stable document uuid (case-sensitive).
    Uuid,
    /// By display name (case-insensitive).
    Name,
}

/// Reference to a candidate form actor, resolved at use-time.
///
/// Configuration may be authored before the referenced actors exist, so a
/// ref is never a live pointer; the form resolver turns it into an actor
/// handle when a transform is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRef {
    pub mode: FormRefMode,
    pub value: String,
}

impl FormRef {
    pub fn uuid(value: impl Into<String>) -> Self {
        Self {
            mode: FormRefMode::Uuid,
            value: value.into(),
        }
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self {
            mode: FormRefMode::Name,
            value: value.into(),
        }
    }

    /// Dedup key: name refs compare case-insensitively, uuid refs exactly.
    pub fn key(&self) -> String {
        match self.mode {
            FormRefMode::Name => format!("name:{}", self.value.to_lowercase()),
            FormRefMode::Uuid => format!("uuid:{}", self.value),
        }
    }
}

/// Raw whitelist/blacklist rule strings (see the `filter` module grammar).
///
/// Empty lists fall back to [`default_form_filters`](super::default_form_filters)
/// wherever defaulting applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbilityFilters {
    pub whitelist: Vec<String>,
    pub blacklist: Vec<String>,
}

impl AbilityFilters {
    pub fn new(whitelist: Vec<String>, blacklist: Vec<String>) -> Self {
        Self {
            whitelist,
            blacklist,
        }
    }
}

/// What kind of action triggers a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerMode {
    ItemName,
}

/// The action that activates a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingTrigger {
    pub mode: TriggerMode,
    pub value: String,
}

impl MappingTrigger {
    pub fn item_name(value: impl Into<String>) -> Self {
        Self {
            mode: TriggerMode::ItemName,
            value: value.into(),
        }
    }
}

/// Authored rule linking a trigger action to candidate forms and filters.
///
/// `id` is stable and never recomputed from content; player overrides patch
/// mappings by this id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormMapping {
    pub id: String,
    pub trigger: MappingTrigger,
    pub form_refs: Vec<FormRef>,
    pub default_filters: AbilityFilters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ability_uuids: Option<Vec<String>>,
}

/// Per-player patch for one mapping. Never replaces the mapping; only adds
/// and removes form refs and optionally overrides the filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOverrideMapping {
    pub id: String,
    pub form_refs_add: Vec<FormRef>,
    pub form_refs_remove: Vec<FormRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters_override: Option<AbilityFilters>,
}

/// Per-user override payload, persisted under the acting user's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerOverrideConfig {
    pub version: u32,
    pub mappings: Vec<PlayerOverrideMapping>,
}

/// Who may edit player overrides beyond the GM.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalPermissions {
    pub player_override_editors: Vec<String>,
}

/// World-level UI toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalUi {
    pub show_debug_logs: bool,
    #[serde(default = "default_true")]
    pub use_chat_fallback: bool,
}

fn default_true() -> bool {
    true
}

/// World-level configuration: the authoritative mapping list plus
/// permissions and UI toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfig {
    pub version: u32,
    pub mappings: Vec<FormMapping>,
    pub permissions: GlobalPermissions,
    pub ui: GlobalUi,
}

/// A mapping after merging global config with a player's override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveMapping {
    pub id: String,
    pub trigger: MappingTrigger,
    pub form_refs: Vec<FormRef>,
    pub filters: AbilityFilters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_ability_uuids: Option<Vec<String>>,
}

/// Merge engine output; recomputed on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveConfig {
    pub version: u32,
    pub mappings: Vec<EffectiveMapping>,
    pub permissions: GlobalPermissions,
    pub ui: GlobalUi,
}

impl EffectiveConfig {
    /// Find the mapping triggered by using an item with the given name
    /// (trimmed, case-insensitive comparison).
    pub fn mapping_for_item_name(&self, item_name: &str) -> Option<&EffectiveMapping> {
        let normalized = item_name.trim().to_lowercase();
        self.mappings.iter().find(|mapping| {
            mapping.trigger.mode == TriggerMode::ItemName
                && mapping.trigger.value.trim().to_lowercase() == normalized
        })
    }
}

impl FormMapping {
    fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::validation("mapping id cannot be empty"));
        }
        if self.trigger.value.trim().is_empty() {
            return Err(DomainError::validation("mapping trigger cannot be empty"));
        }
        for form_ref in &self.form_refs {
            if form_ref.value.trim().is_empty() {
                return Err(DomainError::validation("form ref value cannot be empty"));
            }
        }
        Ok(())
    }
}

impl GlobalConfig {
    /// Check version and per-mapping invariants without normalizing.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.version != SCHEMA_VERSION {
            return Err(DomainError::unsupported_version(
                i64::from(self.version),
                SCHEMA_VERSION,
            ));
        }
        for mapping in &self.mappings {
            mapping.validate()?;
        }
        Ok(())
    }
}

impl PlayerOverrideConfig {
    /// Check version and per-mapping invariants without normalizing.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.version != SCHEMA_VERSION {
            return Err(DomainError::unsupported_version(
                i64::from(self.version),
                SCHEMA_VERSION,
            ));
        }
        for mapping in &self.mappings {
            if mapping.id.trim().is_empty() {
                return Err(DomainError::validation("override mapping id cannot be empty"));
            }
            for form_ref in mapping
                .form_refs_add
                .iter()
                .chain(mapping.form_refs_remove.iter())
            {
                if form_ref.value.trim().is_empty() {
                    return Err(DomainError::validation("form ref value cannot be empty"));
                }
            }
        }
        Ok(())
    }
}
