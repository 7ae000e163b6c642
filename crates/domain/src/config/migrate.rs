//! Schema migration for persisted configuration payloads.
//!
//! Current-version payloads validate strictly. Payloads stamped version 0
//! (or unstamped ones with a recognizable shape) are lifted field-by-field
//! with defaults filling the gaps. Anything newer than the current schema,
//! or unrecognizable, resolves to `config: None` - callers substitute a
//! default. Nothing in here panics or errors.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::SCHEMA_VERSION;

use super::types::{GlobalConfig, PlayerOverrideConfig};

/// Result of attempting to bring a raw payload up to the current schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome<T> {
    /// The usable config, or `None` when the payload must be discarded.
    pub config: Option<T>,
    /// Whether a version lift was performed (callers persist best-effort).
    pub migrated: bool,
    /// The version found on the raw payload, if any.
    pub from_version: Option<i64>,
}

impl<T> MigrationOutcome<T> {
    fn rejected(from_version: Option<i64>) -> Self {
        Self {
            config: None,
            migrated: false,
            from_version,
        }
    }
}

fn parse_current<T: DeserializeOwned>(
    raw: &Value,
    validate: impl Fn(&T) -> bool,
) -> Option<T> {
    let parsed: T = serde_json::from_value(raw.clone()).ok()?;
    validate(&parsed).then_some(parsed)
}

fn raw_version(raw: &Value) -> Option<i64> {
    raw.get("version").and_then(Value::as_i64)
}

fn object_field<'a>(raw: &'a Value, key: &str) -> Option<&'a serde_json::Map<String, Value>> {
    raw.get(key).and_then(Value::as_object)
}

/// Migrate a raw world-config payload to the current schema.
pub fn migrate_global_config(raw: &Value) -> MigrationOutcome<GlobalConfig> {
    if let Some(config) = parse_current(raw, |config: &GlobalConfig| config.validate().is_ok()) {
        return MigrationOutcome {
            config: Some(config),
            migrated: false,
            from_version: Some(i64::from(SCHEMA_VERSION)),
        };
    }

    if !raw.is_object() {
        return MigrationOutcome::rejected(None);
    }

    let from_version = raw_version(raw);
    if from_version.is_some_and(|version| version != 0) {
        return MigrationOutcome::rejected(from_version);
    }
    let recognizable = raw.get("mappings").is_some()
        || raw.get("permissions").is_some()
        || raw.get("ui").is_some();
    if from_version.is_none() && !recognizable {
        return MigrationOutcome::rejected(None);
    }

    let ui = object_field(raw, "ui");
    let permissions = object_field(raw, "permissions");
    let candidate = json!({
        "version": SCHEMA_VERSION,
        "mappings": raw.get("mappings").filter(|value| value.is_array()).cloned().unwrap_or_else(|| json!([])),
        "permissions": {
            "playerOverrideEditors": permissions
                .and_then(|permissions| permissions.get("playerOverrideEditors"))
                .filter(|value| value.is_array())
                .cloned()
                .unwrap_or_else(|| json!([])),
        },
        "ui": {
            "showDebugLogs": ui
                .and_then(|ui| ui.get("showDebugLogs"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            "useChatFallback": ui
                .and_then(|ui| ui.get("useChatFallback"))
                .and_then(Value::as_bool)
                .unwrap_or(true),
        },
    });

    match parse_current(&candidate, |config: &GlobalConfig| config.validate().is_ok()) {
        Some(config) => MigrationOutcome {
            config: Some(config),
            migrated: true,
            from_version,
        },
        None => MigrationOutcome::rejected(from_version),
    }
}

/// Migrate a raw player-override payload to the current schema.
pub fn migrate_player_override(raw: &Value) -> MigrationOutcome<PlayerOverrideConfig> {
    if let Some(config) =
        parse_current(raw, |config: &PlayerOverrideConfig| config.validate().is_ok())
    {
        return MigrationOutcome {
            config: Some(config),
            migrated: false,
            from_version: Some(i64::from(SCHEMA_VERSION)),
        };
    }

    if !raw.is_object() {
        return MigrationOutcome::rejected(None);
    }

    let from_version = raw_version(raw);
    if from_version.is_some_and(|version| version != 0) {
        return MigrationOutcome::rejected(from_version);
    }
    if from_version.is_none() && raw.get("mappings").is_none() {
        return MigrationOutcome::rejected(None);
    }

    let candidate = json!({
        "version": SCHEMA_VERSION,
        "mappings": raw.get("mappings").filter(|value| value.is_array()).cloned().unwrap_or_else(|| json!([])),
    });

    match parse_current(&candidate, |config: &PlayerOverrideConfig| {
        config.validate().is_ok()
    }) {
        Some(config) => MigrationOutcome {
            config: Some(config),
            migrated: true,
            from_version,
        },
        None => MigrationOutcome::rejected(from_version),
    }
}
