//! The shipped game-system adapter.
//!
//! Interprets the "nimble" ruleset's actor documents: which system fields
//! belong to the character rather than the form, how token appearance
//! carries over, and how items are copied with a transform.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use formshift_domain::{
    filter::items_by_ids, injected_item_payload, select_item_ids, strip_item_ids, ActorShapeState,
    ActorSnapshot, ActorUpdate, ItemRecord, SelectOptions, TransformPlan, FLAG_SCOPE,
};

use crate::config_service::ConfigService;
use crate::ports::{
    ActorRef, FlagStorePort, GameSystemError, GameSystemPort, HostDocumentPort, PlanRequest,
    RevertOptions,
};
use crate::transform::STATE_KEY;

pub const NIMBLE_ADAPTER_ID: &str = "nimble";

/// System fields that describe the character rather than the form; they
/// survive a transform and win on revert.
const KEEP_SYSTEM_ROOT_KEYS: &[&str] = &[
    "hp",
    "mana",
    "wounds",
    "resources",
    "level",
    "classData",
    "levelUpHistory",
    "abilities",
    "defenses",
    "saves",
    "skills",
    "gear",
    "inventory",
];

/// Same idea for the nested `attributes` record.
const KEEP_SYSTEM_ATTRIBUTE_KEYS: &[&str] = &[
    "hp",
    "mana",
    "wounds",
    "resources",
    "level",
    "hitDice",
    "bonusHitDice",
    "armor",
    "abilities",
    "defenses",
    "saves",
    "skills",
];

/// Token fields the form contributes (appearance and senses).
const FORM_TOKEN_KEYS: &[&str] = &[
    "img",
    "texture",
    "width",
    "height",
    "scale",
    "sight",
    "vision",
    "light",
    "dimSight",
    "brightSight",
    "dimLight",
    "brightLight",
    "detectionModes",
];

fn object_or_empty(value: Option<&Value>) -> Value {
    match value {
        Some(value) if value.is_object() => value.clone(),
        _ => Value::Object(Map::new()),
    }
}

/// The actor's system data (`system`, with the legacy `data` fallback).
fn system_of(doc: &Value) -> Value {
    object_or_empty(doc.get("system").or_else(|| doc.get("data")))
}

/// The prototype token (`prototypeToken`, with the legacy `token` fallback).
fn prototype_token_of(doc: &Value) -> Value {
    object_or_empty(doc.get("prototypeToken").or_else(|| doc.get("token")))
}

fn items_of(doc: &Value) -> Vec<Value> {
    doc.get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// The form's system overlaid with the base actor's kept fields.
fn merge_system_data(base_system: &Value, form_system: &Value) -> Value {
    let mut merged = form_system.clone();
    let Some(merged_map) = merged.as_object_mut() else {
        return merged;
    };

    let base = match base_system.as_object() {
        Some(base) => base,
        None => return merged,
    };
    for key in KEEP_SYSTEM_ROOT_KEYS {
        if let Some(kept) = base.get(*key) {
            merged_map.insert((*key).to_string(), kept.clone());
        }
    }

    if let Some(base_attributes) = base.get("attributes").and_then(Value::as_object) {
        let mut merged_attributes = merged_map
            .get("attributes")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        for key in KEEP_SYSTEM_ATTRIBUTE_KEYS {
            if let Some(kept) = base_attributes.get(*key) {
                merged_attributes.insert((*key).to_string(), kept.clone());
            }
        }
        merged_map.insert("attributes".to_string(), Value::Object(merged_attributes));
    }

    merged
}

/// The base token overlaid with the form's visual fields.
fn merge_prototype_token(base_token: &Value, form_token: &Value) -> Value {
    let mut merged = base_token.clone();
    let Some(merged_map) = merged.as_object_mut() else {
        return merged;
    };
    if let Some(form) = form_token.as_object() {
        for key in FORM_TOKEN_KEYS {
            if let Some(value) = form.get(*key) {
                merged_map.insert((*key).to_string(), value.clone());
            }
        }
    }
    merged
}

/// Just the visual fields of a token, for syncing on-scene representations.
fn token_update_data(prototype_token: &Value) -> Value {
    let mut update = Map::new();
    if let Some(token) = prototype_token.as_object() {
        for key in FORM_TOKEN_KEYS {
            if let Some(value) = token.get(*key) {
                update.insert((*key).to_string(), value.clone());
            }
        }
    }
    Value::Object(update)
}

fn item_ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|raw| ItemRecord::new(raw).id())
        .map(str::to_string)
        .collect()
}

fn injected_item_ids(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .map(ItemRecord::new)
        .filter(|item| item.is_injected())
        .filter_map(|item| item.id())
        .map(str::to_string)
        .collect()
}

/// Snapshot items missing from the actor (by id), prepared for creation.
fn missing_snapshot_items(current_items: &[Value], snapshot_items: &[Value]) -> Vec<Value> {
    let current_ids = item_ids(current_items);
    snapshot_items
        .iter()
        .filter(|raw| raw.is_object())
        .filter(|raw| match ItemRecord::new(raw).id() {
            Some(id) => !current_ids.iter().any(|current| current == id),
            None => true,
        })
        .map(strip_item_ids)
        .collect()
}

/// An item document is usable for injection unless it declares itself to be
/// some other document kind.
fn is_item_document(value: &Value) -> bool {
    match value.get("documentName") {
        None => value.is_object(),
        Some(Value::String(name)) => name == "Item",
        Some(_) => false,
    }
}

pub struct NimbleAdapter {
    host: Arc<dyn HostDocumentPort>,
    flags: Arc<dyn FlagStorePort>,
    config: Arc<ConfigService>,
}

impl NimbleAdapter {
    pub fn new(
        host: Arc<dyn HostDocumentPort>,
        flags: Arc<dyn FlagStorePort>,
        config: Arc<ConfigService>,
    ) -> Self {
        Self {
            host,
            flags,
            config,
        }
    }

    /// Resolve mapped ability uuids into injection-ready item payloads.
    /// Duplicates and unresolvable uuids are skipped.
    async fn resolve_form_ability_items(
        &self,
        form_ability_uuids: &[String],
    ) -> Result<Vec<Value>, GameSystemError> {
        let mut resolved: Vec<Value> = Vec::new();
        let mut seen: Vec<String> = Vec::new();
        for raw_uuid in form_ability_uuids {
            let uuid = raw_uuid.trim();
            if uuid.is_empty() || seen.iter().any(|existing| existing == uuid) {
                continue;
            }
            seen.push(uuid.to_string());

            let Some(raw_item) = self.host.resolve_item_by_uuid(uuid).await? else {
                tracing::warn!(uuid, "Mapped ability uuid did not resolve");
                continue;
            };
            if !is_item_document(&raw_item) {
                tracing::warn!(uuid, "Mapped ability uuid is not an item document");
                continue;
            }
            resolved.push(injected_item_payload(&raw_item, Some(uuid)));
        }
        Ok(resolved)
    }

    /// The normalized trigger names of every configured mapping.
    async fn trigger_names(&self) -> Vec<String> {
        self.config
            .effective_config(None)
            .await
            .mappings
            .iter()
            .map(|mapping| mapping.trigger.value.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[async_trait]
impl GameSystemPort for NimbleAdapter {
    fn id(&self) -> &str {
        NIMBLE_ADAPTER_ID
    }

    async fn detect(&self) -> bool {
        match self.host.system_id().await {
            Ok(system_id) => system_id == NIMBLE_ADAPTER_ID,
            Err(err) => {
                tracing::warn!(error = %err, "System detection failed");
                false
            }
        }
    }

    async fn is_shift_trigger(&self, item_name: &str) -> Result<bool, GameSystemError> {
        let normalized = item_name.trim().to_lowercase();
        if normalized.is_empty() {
            return Ok(false);
        }
        let names = self.trigger_names().await;
        Ok(names.iter().any(|name| *name == normalized))
    }

    async fn actor_snapshot(&self, actor: &ActorRef) -> Result<ActorSnapshot, GameSystemError> {
        let doc = self.host.actor_document(&actor.id).await?;
        Ok(ActorSnapshot::new(
            system_of(&doc),
            items_of(&doc),
            prototype_token_of(&doc),
        ))
    }

    async fn build_transform_plan(
        &self,
        request: PlanRequest,
    ) -> Result<TransformPlan, GameSystemError> {
        let base_doc = self.host.actor_document(&request.base_actor.id).await?;
        let form_doc = self.host.actor_document(&request.form_actor.id).await?;

        let form_system = system_of(&form_doc);
        let base_token = prototype_token_of(&base_doc);
        let form_token = prototype_token_of(&form_doc);
        let form_items = items_of(&form_doc);
        let base_items = items_of(&base_doc);

        let form_item_ids =
            select_item_ids(&form_items, &request.filters, SelectOptions::default());
        let base_item_ids_to_keep = select_item_ids(
            &base_items,
            &request.filters,
            SelectOptions::base_keep_list(),
        );

        let mut injected_items: Vec<Value> = items_by_ids(&form_items, &form_item_ids)
            .into_iter()
            .map(|raw| injected_item_payload(raw, None))
            .collect();
        injected_items.extend(
            self.resolve_form_ability_items(&request.form_ability_uuids)
                .await?,
        );

        Ok(TransformPlan {
            actor_update: ActorUpdate {
                // The checkpoint snapshot is the base-state reference.
                system: merge_system_data(&request.snapshot.system, &form_system),
                prototype_token: merge_prototype_token(&base_token, &form_token),
            },
            form_item_ids,
            form_items: injected_items,
            base_item_ids_to_keep: Some(base_item_ids_to_keep),
        })
    }

    async fn apply_transform(
        &self,
        actor: &ActorRef,
        plan: &TransformPlan,
    ) -> Result<(), GameSystemError> {
        let doc = self.host.actor_document(&actor.id).await?;
        let current_items = items_of(&doc);

        let mut ids_to_delete = injected_item_ids(&current_items);
        if let Some(keep) = &plan.base_item_ids_to_keep {
            for raw in &current_items {
                let item = ItemRecord::new(raw);
                let Some(id) = item.id() else { continue };
                if item.is_injected() || keep.iter().any(|kept| kept == id) {
                    continue;
                }
                if !ids_to_delete.iter().any(|existing| existing == id) {
                    ids_to_delete.push(id.to_string());
                }
            }
        }
        if !ids_to_delete.is_empty() {
            self.host
                .delete_embedded_items(&actor.id, ids_to_delete)
                .await?;
        }

        self.host
            .update_actor(
                &actor.id,
                json!({
                    "system": plan.actor_update.system,
                    "prototypeToken": plan.actor_update.prototype_token,
                }),
            )
            .await?;

        let token_update = token_update_data(&plan.actor_update.prototype_token);
        if token_update.as_object().is_some_and(|map| !map.is_empty()) {
            self.host.sync_active_tokens(&actor.id, token_update).await?;
        }

        if !plan.form_items.is_empty() {
            self.host
                .create_embedded_items(&actor.id, plan.form_items.clone())
                .await?;
        }
        Ok(())
    }

    async fn apply_revert(
        &self,
        actor: &ActorRef,
        snapshot: &ActorSnapshot,
        options: RevertOptions,
    ) -> Result<(), GameSystemError> {
        let doc = self.host.actor_document(&actor.id).await?;
        let current_items = items_of(&doc);

        let reverted_system = if options.preserve_base_stats {
            // Live-progressed fields win over the stale snapshot.
            merge_system_data(&system_of(&doc), &snapshot.system)
        } else {
            snapshot.system.clone()
        };

        if options.preserve_base_stats {
            let injected = injected_item_ids(&current_items);
            if !injected.is_empty() {
                self.host.delete_embedded_items(&actor.id, injected).await?;
            }
            let missing = missing_snapshot_items(&current_items, &snapshot.items);
            if !missing.is_empty() {
                self.host.create_embedded_items(&actor.id, missing).await?;
            }
        } else {
            let all_ids = item_ids(&current_items);
            if !all_ids.is_empty() {
                self.host.delete_embedded_items(&actor.id, all_ids).await?;
            }
            let recreate: Vec<Value> = snapshot
                .items
                .iter()
                .filter(|raw| raw.is_object())
                .map(strip_item_ids)
                .collect();
            if !recreate.is_empty() {
                self.host.create_embedded_items(&actor.id, recreate).await?;
            }
        }

        self.host
            .update_actor(
                &actor.id,
                json!({
                    "system": reverted_system,
                    "prototypeToken": snapshot.prototype_token,
                }),
            )
            .await?;

        let token_update = token_update_data(&snapshot.prototype_token);
        if token_update.as_object().is_some_and(|map| !map.is_empty()) {
            self.host.sync_active_tokens(&actor.id, token_update).await?;
        }
        Ok(())
    }

    async fn ensure_trigger_action(&self, actor: &ActorRef) -> Result<(), GameSystemError> {
        let trigger_names = self.trigger_names().await;
        if trigger_names.is_empty() {
            return Ok(());
        }

        let doc = self.host.actor_document(&actor.id).await?;
        let present = items_of(&doc).iter().any(|raw| {
            let name = ItemRecord::new(raw).normalized_name();
            trigger_names.iter().any(|trigger| *trigger == name)
        });
        if present {
            return Ok(());
        }

        // The action got stripped; restore it from the persisted baseline.
        let raw_state = self
            .flags
            .actor_flag(&actor.id, FLAG_SCOPE, STATE_KEY)
            .await
            .map_err(GameSystemError::Flags)?;
        let snapshot = raw_state
            .as_ref()
            .and_then(|raw| ActorShapeState::from_value(raw).ok())
            .and_then(|state| state.valid_snapshot());
        let Some(snapshot) = snapshot else {
            return Ok(());
        };

        let restorable: Vec<Value> = snapshot
            .items
            .iter()
            .filter(|raw| {
                let name = ItemRecord::new(raw).normalized_name();
                trigger_names.iter().any(|trigger| *trigger == name)
            })
            .map(strip_item_ids)
            .collect();
        if !restorable.is_empty() {
            tracing::info!(actor_id = %actor.id, "Restoring stripped trigger action");
            self.host
                .create_embedded_items(&actor.id, restorable)
                .await?;
        }
        Ok(())
    }
}
