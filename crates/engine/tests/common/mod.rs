//! In-memory host environment for integration tests.
//!
//! Implements the host ports against plain maps, with failure injection and
//! an update gate for exercising the single-flight lock mid-operation.

// Each integration test binary compiles this module and uses a subset of it.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{Mutex, Notify};

use formshift_domain::{
    AbilityFilters, FormMapping, FormRef, GlobalConfig, GlobalPermissions, GlobalUi,
    MappingTrigger, FLAG_SCOPE, SCHEMA_VERSION,
};
use formshift_engine::{
    ActorRef, AdapterRegistry, ConfigService, FlagStoreError, FlagStorePort, FormResolver,
    FormTransitionEvent, HookError, HostDocumentError, HostDocumentPort, NotificationPort,
    ShapeshiftService, TransitionHook, TransitionHookPort, TriggerHandler,
};
use formshift_engine::adapter::NimbleAdapter;

/// Pauses the first `update_actor` call until released, so a test can hold
/// an operation mid-flight.
pub struct UpdateGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

/// Route engine logs through a test subscriber once per binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Default)]
pub struct FakeHost {
    pub system: String,
    actors: Mutex<BTreeMap<String, Value>>,
    items_by_uuid: Mutex<HashMap<String, Value>>,
    pub fail_create_once: AtomicBool,
    pub fail_create_always: AtomicBool,
    update_gate: Mutex<Option<UpdateGate>>,
    pub synced_tokens: Mutex<Vec<(String, Value)>>,
}

impl FakeHost {
    pub fn new() -> Self {
        Self {
            system: "nimble".into(),
            ..Default::default()
        }
    }

    pub async fn seed_actor(&self, doc: Value) {
        let id = doc["id"].as_str().expect("actor doc needs an id").to_string();
        self.actors.lock().await.insert(id, doc);
    }

    pub async fn seed_item_uuid(&self, uuid: &str, item: Value) {
        self.items_by_uuid.lock().await.insert(uuid.into(), item);
    }

    pub async fn actor_doc(&self, actor_id: &str) -> Value {
        self.actors
            .lock()
            .await
            .get(actor_id)
            .cloned()
            .expect("actor exists")
    }

    /// Install a gate on the next actor update; returns handles to await
    /// entry and to release it.
    pub async fn install_update_gate(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        *self.update_gate.lock().await = Some(UpdateGate {
            entered: entered.clone(),
            release: release.clone(),
        });
        (entered, release)
    }

    pub async fn item_names(&self, actor_id: &str) -> Vec<String> {
        let doc = self.actor_doc(actor_id).await;
        doc["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl HostDocumentPort for FakeHost {
    async fn system_id(&self) -> Result<String, HostDocumentError> {
        Ok(self.system.clone())
    }

    async fn list_actors(&self) -> Result<Vec<ActorRef>, HostDocumentError> {
        Ok(self
            .actors
            .lock()
            .await
            .values()
            .map(|doc| {
                let id = doc["id"].as_str().unwrap_or_default();
                let name = doc["name"].as_str().unwrap_or_default();
                ActorRef::new(id, format!("Actor.{id}"), name)
            })
            .collect())
    }

    async fn actor_document(&self, actor_id: &str) -> Result<Value, HostDocumentError> {
        self.actors
            .lock()
            .await
            .get(actor_id)
            .cloned()
            .ok_or_else(|| HostDocumentError::ActorNotFound(actor_id.into()))
    }

    async fn update_actor(&self, actor_id: &str, update: Value) -> Result<(), HostDocumentError> {
        let gate = self.update_gate.lock().await.take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        let mut actors = self.actors.lock().await;
        let doc = actors
            .get_mut(actor_id)
            .ok_or_else(|| HostDocumentError::ActorNotFound(actor_id.into()))?;
        if let (Some(doc), Some(update)) = (doc.as_object_mut(), update.as_object()) {
            for (key, value) in update {
                doc.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    async fn create_embedded_items(
        &self,
        actor_id: &str,
        items: Vec<Value>,
    ) -> Result<(), HostDocumentError> {
        if self.fail_create_always.load(Ordering::SeqCst)
            || self.fail_create_once.swap(false, Ordering::SeqCst)
        {
            return Err(HostDocumentError::Operation("item creation refused".into()));
        }

        let mut actors = self.actors.lock().await;
        let doc = actors
            .get_mut(actor_id)
            .ok_or_else(|| HostDocumentError::ActorNotFound(actor_id.into()))?;
        let list = doc
            .as_object_mut()
            .and_then(|doc| doc.get_mut("items"))
            .and_then(Value::as_array_mut)
            .ok_or_else(|| HostDocumentError::Operation("actor has no item list".into()))?;
        for mut item in items {
            // Hosts assign fresh ids on creation.
            if let Some(item) = item.as_object_mut() {
                item.insert("_id".into(), json!(uuid::Uuid::new_v4().to_string()));
            }
            list.push(item);
        }
        Ok(())
    }

    async fn delete_embedded_items(
        &self,
        actor_id: &str,
        item_ids: Vec<String>,
    ) -> Result<(), HostDocumentError> {
        let mut actors = self.actors.lock().await;
        let doc = actors
            .get_mut(actor_id)
            .ok_or_else(|| HostDocumentError::ActorNotFound(actor_id.into()))?;
        if let Some(list) = doc
            .as_object_mut()
            .and_then(|doc| doc.get_mut("items"))
            .and_then(Value::as_array_mut)
        {
            list.retain(|item| {
                let id = item
                    .get("id")
                    .and_then(Value::as_str)
                    .or_else(|| item.get("_id").and_then(Value::as_str))
                    .unwrap_or_default();
                !item_ids.iter().any(|gone| gone == id)
            });
        }
        Ok(())
    }

    async fn sync_active_tokens(
        &self,
        actor_id: &str,
        token_update: Value,
    ) -> Result<(), HostDocumentError> {
        self.synced_tokens
            .lock()
            .await
            .push((actor_id.to_string(), token_update));
        Ok(())
    }

    async fn resolve_item_by_uuid(&self, uuid: &str) -> Result<Option<Value>, HostDocumentError> {
        Ok(self.items_by_uuid.lock().await.get(uuid).cloned())
    }
}

#[derive(Default)]
pub struct MemoryFlags {
    world: Mutex<HashMap<(String, String), Value>>,
    user: Mutex<HashMap<(String, String, String), Value>>,
    actor: Mutex<HashMap<(String, String, String), Value>>,
}

impl MemoryFlags {
    pub async fn seed_world(&self, scope: &str, key: &str, value: Value) {
        self.world
            .lock()
            .await
            .insert((scope.to_string(), key.to_string()), value);
    }

    pub async fn seed_actor(&self, actor_id: &str, scope: &str, key: &str, value: Value) {
        self.actor.lock().await.insert(
            (actor_id.to_string(), scope.to_string(), key.to_string()),
            value,
        );
    }

    pub async fn actor_flag_value(&self, actor_id: &str, key: &str) -> Option<Value> {
        self.actor
            .lock()
            .await
            .get(&(actor_id.to_string(), FLAG_SCOPE.to_string(), key.to_string()))
            .cloned()
    }
}

#[async_trait]
impl FlagStorePort for MemoryFlags {
    async fn world_flag(&self, scope: &str, key: &str) -> Result<Option<Value>, FlagStoreError> {
        Ok(self
            .world
            .lock()
            .await
            .get(&(scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn set_world_flag(
        &self,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError> {
        self.world
            .lock()
            .await
            .insert((scope.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn user_flag(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, FlagStoreError> {
        Ok(self
            .user
            .lock()
            .await
            .get(&(user_id.to_string(), scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn set_user_flag(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError> {
        self.user.lock().await.insert(
            (user_id.to_string(), scope.to_string(), key.to_string()),
            value,
        );
        Ok(())
    }

    async fn actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, FlagStoreError> {
        Ok(self
            .actor
            .lock()
            .await
            .get(&(actor_id.to_string(), scope.to_string(), key.to_string()))
            .cloned())
    }

    async fn set_actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError> {
        self.actor.lock().await.insert(
            (actor_id.to_string(), scope.to_string(), key.to_string()),
            value,
        );
        Ok(())
    }

    async fn clear_actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<(), FlagStoreError> {
        self.actor.lock().await.remove(&(
            actor_id.to_string(),
            scope.to_string(),
            key.to_string(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct CollectingNotifications {
    pub messages: std::sync::Mutex<Vec<(String, String)>>,
}

impl CollectingNotifications {
    pub fn of_level(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .expect("notification lock")
            .iter()
            .filter(|(recorded, _)| recorded == level)
            .map(|(_, message)| message.clone())
            .collect()
    }

    fn push(&self, level: &str, message: &str) {
        self.messages
            .lock()
            .expect("notification lock")
            .push((level.to_string(), message.to_string()));
    }
}

impl NotificationPort for CollectingNotifications {
    fn info(&self, message: &str) {
        self.push("info", message);
    }

    fn warn(&self, message: &str) {
        self.push("warn", message);
    }

    fn error(&self, message: &str) {
        self.push("error", message);
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub events: std::sync::Mutex<Vec<(TransitionHook, FormTransitionEvent)>>,
    pub fail: AtomicBool,
}

impl RecordingHooks {
    pub fn recorded(&self) -> Vec<(TransitionHook, FormTransitionEvent)> {
        self.events.lock().expect("hook lock").clone()
    }
}

impl TransitionHookPort for RecordingHooks {
    fn emit(&self, hook: TransitionHook, event: &FormTransitionEvent) -> Result<(), HookError> {
        self.events
            .lock()
            .expect("hook lock")
            .push((hook, event.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(HookError("observer exploded".into()));
        }
        Ok(())
    }
}

/// The wired-up engine with its fakes exposed for inspection.
pub struct TestEnv {
    pub host: Arc<FakeHost>,
    pub flags: Arc<MemoryFlags>,
    pub config: Arc<ConfigService>,
    pub service: Arc<ShapeshiftService>,
    pub resolver: Arc<FormResolver>,
    pub handler: TriggerHandler,
    pub notifications: Arc<CollectingNotifications>,
    pub hooks: Arc<RecordingHooks>,
}

pub fn default_filters() -> AbilityFilters {
    AbilityFilters::new(vec!["type:armor".into()], vec!["type:weapon".into()])
}

pub fn mapping_config(form_names: &[&str], filters: AbilityFilters) -> GlobalConfig {
    GlobalConfig {
        version: SCHEMA_VERSION,
        mappings: vec![FormMapping {
            id: "map_1".into(),
            trigger: MappingTrigger::item_name("Wildshape"),
            form_refs: form_names.iter().map(|name| FormRef::name(*name)).collect(),
            default_filters: filters,
            form_ability_uuids: None,
        }],
        permissions: GlobalPermissions::default(),
        ui: GlobalUi::default(),
    }
}

pub fn druid_doc() -> Value {
    json!({
        "id": "druid1",
        "name": "Mira",
        "system": {
            "attributes": { "hp": { "value": 10, "max": 10 } },
            "classData": { "levels": 3 },
            "spellPower": 7,
        },
        "items": [
            { "_id": "ws1", "name": "Wildshape", "type": "feature" },
            { "_id": "class1", "name": "Druid", "type": "class" },
            { "_id": "sword1", "name": "Sword", "type": "weapon" },
        ],
        "prototypeToken": { "img": "tokens/druid.png", "width": 1, "name": "Mira" },
    })
}

pub fn wolf_doc() -> Value {
    json!({
        "id": "wolf1",
        "name": "Wolf Form",
        "system": {
            "attributes": { "hp": { "value": 30, "max": 30 } },
            "ferocity": 5,
        },
        "items": [
            { "_id": "claws1", "name": "Claws", "type": "weapon" },
            { "_id": "hide1", "name": "Hide", "type": "armor" },
        ],
        "prototypeToken": { "img": "tokens/wolf.png", "width": 2, "name": "Wolf" },
    })
}

pub fn bear_doc() -> Value {
    json!({
        "id": "bear1",
        "name": "Bear Form",
        "system": {
            "attributes": { "hp": { "value": 45, "max": 45 } },
            "ferocity": 8,
        },
        "items": [
            { "_id": "maul1", "name": "Maul", "type": "weapon" },
            { "_id": "thickhide1", "name": "Thick Hide", "type": "armor" },
        ],
        "prototypeToken": { "img": "tokens/bear.png", "width": 3, "name": "Bear" },
    })
}

pub async fn build_env(global: GlobalConfig) -> TestEnv {
    init_tracing();

    let host = Arc::new(FakeHost::new());
    host.seed_actor(druid_doc()).await;
    host.seed_actor(wolf_doc()).await;
    host.seed_actor(bear_doc()).await;

    let flags = Arc::new(MemoryFlags::default());
    flags
        .seed_world(
            FLAG_SCOPE,
            "globalConfig",
            serde_json::to_value(&global).expect("config serializes"),
        )
        .await;

    let config = Arc::new(ConfigService::new(flags.clone()));
    let adapter = Arc::new(NimbleAdapter::new(
        host.clone(),
        flags.clone(),
        config.clone(),
    ));
    let notifications = Arc::new(CollectingNotifications::default());
    let hooks = Arc::new(RecordingHooks::default());
    let service = Arc::new(ShapeshiftService::new(
        adapter.clone(),
        flags.clone(),
        config.clone(),
        notifications.clone(),
        hooks.clone(),
    ));
    let resolver = Arc::new(FormResolver::new(host.clone(), config.clone()));

    let mut registry = AdapterRegistry::new();
    registry.register(adapter);
    let handler = TriggerHandler::new(
        Arc::new(registry),
        host.clone(),
        config.clone(),
        resolver.clone(),
        service.clone(),
        notifications.clone(),
    );

    TestEnv {
        host,
        flags,
        config,
        service,
        resolver,
        handler,
        notifications,
        hooks,
    }
}

pub fn druid() -> ActorRef {
    ActorRef::new("druid1", "Actor.druid1", "Mira")
}

pub fn wolf() -> ActorRef {
    ActorRef::new("wolf1", "Actor.wolf1", "Wolf Form")
}

pub fn bear() -> ActorRef {
    ActorRef::new("bear1", "Actor.bear1", "Bear Form")
}
