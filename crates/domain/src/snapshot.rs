//! Actor snapshots, transform plans, and the persisted shape state.
//!
//! Two snapshots are in flight during a transform: the *baseline* (the
//! actor's true original state, carried across repeated form-swaps) and the
//! *checkpoint* (the state immediately before the current operation, used
//! only for rollback). The baseline is what gets persisted inside
//! [`ActorShapeState`]; checkpoints are ephemeral.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DomainError;
use crate::SCHEMA_VERSION;

/// A deep, independent copy of an actor's mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorSnapshot {
    pub taken_at: DateTime<Utc>,
    pub system: Value,
    pub items: Vec<Value>,
    pub prototype_token: Value,
}

impl ActorSnapshot {
    pub fn new(system: Value, items: Vec<Value>, prototype_token: Value) -> Self {
        Self {
            taken_at: Utc::now(),
            system,
            items,
            prototype_token,
        }
    }

    /// A snapshot is only restorable when its system and token are records.
    pub fn is_structurally_valid(&self) -> bool {
        self.system.is_object() && self.prototype_token.is_object()
    }

    /// Parse a persisted payload; malformed payloads are an error the
    /// caller logs and treats as absence.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let snapshot: Self = serde_json::from_value(value.clone())
            .map_err(|err| DomainError::malformed_payload(format!("actor snapshot: {err}")))?;
        if !snapshot.is_structurally_valid() {
            return Err(DomainError::malformed_payload(
                "actor snapshot system and prototype token must be records",
            ));
        }
        Ok(snapshot)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// The stat/token patch a transform applies to the actor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorUpdate {
    pub system: Value,
    pub prototype_token: Value,
}

/// An ephemeral mutation plan produced by the plan builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformPlan {
    pub actor_update: ActorUpdate,
    /// Ids of the form items that passed the filters (on the form actor).
    pub form_item_ids: Vec<String>,
    /// Deep-cloned, id-stripped, injection-tagged items to create.
    pub form_items: Vec<Value>,
    /// Base items to keep; everything else non-injected gets removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_item_ids_to_keep: Option<Vec<String>>,
}

/// Persisted per-actor lifecycle state.
///
/// Exists only while the actor is shaped: created on the first successful
/// transform, rewritten on form swaps, and cleared entirely (not merely
/// flagged off) by a successful revert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorShapeState {
    pub version: u32,
    pub is_shaped: bool,
    pub base_actor_id: String,
    pub current_form_actor_id: String,
    pub current_form_name: String,
    /// The baseline snapshot, stored raw so a payload with a damaged
    /// snapshot still identifies which actor/form it belonged to.
    #[serde(default)]
    pub snapshot: Option<Value>,
}

impl ActorShapeState {
    /// State written after a successful transform into `form`.
    pub fn shaped(
        base_actor_id: impl Into<String>,
        form_actor_id: impl Into<String>,
        form_name: impl Into<String>,
        baseline: &ActorSnapshot,
    ) -> Self {
        Self {
            version: SCHEMA_VERSION,
            is_shaped: true,
            base_actor_id: base_actor_id.into(),
            current_form_actor_id: form_actor_id.into(),
            current_form_name: form_name.into(),
            snapshot: Some(baseline.to_value()),
        }
    }

    /// Parse a persisted payload, rejecting foreign schema versions and
    /// non-record snapshots.
    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let version = value.get("version").and_then(Value::as_i64);
        if version != Some(i64::from(SCHEMA_VERSION)) {
            return Err(DomainError::unsupported_version(
                version.unwrap_or(-1),
                SCHEMA_VERSION,
            ));
        }
        let state: Self = serde_json::from_value(value.clone())
            .map_err(|err| DomainError::malformed_payload(format!("actor shape state: {err}")))?;
        if let Some(snapshot) = &state.snapshot {
            if !snapshot.is_object() {
                return Err(DomainError::malformed_payload(
                    "actor shape state snapshot must be a record or null",
                ));
            }
        }
        Ok(state)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The baseline snapshot, if present and structurally valid.
    pub fn valid_snapshot(&self) -> Option<ActorSnapshot> {
        self.snapshot
            .as_ref()
            .and_then(|raw| ActorSnapshot::from_value(raw).ok())
    }
}
