//! Documented defaults for configuration payloads.

use crate::SCHEMA_VERSION;

use super::types::{
    AbilityFilters, GlobalConfig, GlobalPermissions, GlobalUi, PlayerOverrideConfig,
};

/// The documented default filter set, applied wherever a mapping's filter
/// lists are empty: carry class/background/ancestry identity plus armor and
/// miscellaneous objects, never weapons.
pub fn default_form_filters() -> AbilityFilters {
    AbilityFilters {
        whitelist: vec![
            "type:class".into(),
            "type:background".into(),
            "type:ancestry".into(),
            "objectType:armor".into(),
            "objectType:misc".into(),
        ],
        blacklist: vec!["objectType:weapon".into()],
    }
}

impl Default for GlobalUi {
    fn default() -> Self {
        Self {
            show_debug_logs: false,
            use_chat_fallback: true,
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            mappings: Vec::new(),
            permissions: GlobalPermissions::default(),
            ui: GlobalUi::default(),
        }
    }
}

impl Default for PlayerOverrideConfig {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            mappings: Vec::new(),
        }
    }
}
