//! Borrowed views and payload builders for host item documents.
//!
//! Item documents arrive as arbitrary JSON from the host; [`ItemRecord`]
//! exposes the handful of fields this system cares about without copying.
//! Malformed fields read as absent rather than erroring.

use serde_json::{Map, Value};

use crate::{FLAG_SCOPE, LEGACY_FLAG_SCOPE};

/// Borrowed view over one host item document.
#[derive(Debug, Clone, Copy)]
pub struct ItemRecord<'a> {
    raw: &'a Value,
}

impl<'a> ItemRecord<'a> {
    pub fn new(raw: &'a Value) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &'a Value {
        self.raw
    }

    /// The item's stable id (`id` or `_id`), if it is a non-empty string.
    pub fn id(&self) -> Option<&'a str> {
        let id = self
            .raw
            .get("id")
            .and_then(Value::as_str)
            .or_else(|| self.raw.get("_id").and_then(Value::as_str))?;
        (!id.is_empty()).then_some(id)
    }

    pub fn name(&self) -> &'a str {
        self.raw.get("name").and_then(Value::as_str).unwrap_or("")
    }

    /// Trimmed, lowercased display name for comparisons.
    pub fn normalized_name(&self) -> String {
        self.name().trim().to_lowercase()
    }

    /// The raw `type` field; may be a string or a legacy record.
    pub fn type_value(&self) -> Option<&'a Value> {
        self.raw.get("type")
    }

    pub fn system(&self) -> Option<&'a Value> {
        self.raw.get("system").filter(|value| value.is_object())
    }

    /// Whether this item was copied onto the actor by a transform.
    ///
    /// Checks the module-scoped flags first; items tagged by earlier
    /// releases under the legacy scope still count.
    pub fn is_injected(&self) -> bool {
        let Some(flags) = self.raw.get("flags").and_then(Value::as_object) else {
            return false;
        };
        let scoped = flags
            .get(FLAG_SCOPE)
            .and_then(Value::as_object)
            .or_else(|| flags.get(LEGACY_FLAG_SCOPE).and_then(Value::as_object));
        scoped
            .map(|scope| scope.get("injected") == Some(&Value::Bool(true)))
            .unwrap_or(false)
    }
}

/// Deep-clone an item payload with its ids stripped, ready for creation on
/// another actor.
pub fn strip_item_ids(raw: &Value) -> Value {
    let mut payload = raw.clone();
    if let Some(map) = payload.as_object_mut() {
        map.remove("id");
        map.remove("_id");
    }
    payload
}

/// Build the payload for an item injected by a transform: ids stripped and
/// the module-scoped `injected` flag set so it can be found and removed on
/// revert. `source_uuid` records where an ability-uuid item came from.
pub fn injected_item_payload(raw: &Value, source_uuid: Option<&str>) -> Value {
    let mut payload = strip_item_ids(raw);
    let Some(map) = payload.as_object_mut() else {
        return payload;
    };

    let flags = map
        .entry("flags")
        .or_insert_with(|| Value::Object(Map::new()));
    if !flags.is_object() {
        *flags = Value::Object(Map::new());
    }
    if let Some(flags) = flags.as_object_mut() {
        let scoped = flags
            .entry(FLAG_SCOPE)
            .or_insert_with(|| Value::Object(Map::new()));
        if !scoped.is_object() {
            *scoped = Value::Object(Map::new());
        }
        if let Some(scoped) = scoped.as_object_mut() {
            scoped.insert("injected".into(), Value::Bool(true));
            if let Some(uuid) = source_uuid {
                scoped.insert("sourceUuid".into(), Value::String(uuid.into()));
            }
        }
    }
    payload
}
