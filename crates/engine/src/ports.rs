//! Port traits for the host-environment boundary.
//!
//! These are the only abstractions in the engine. Ports exist for:
//! - Host document access (actor/item CRUD lives with the host)
//! - Flag persistence (world / user / actor scoped payloads)
//! - User-facing notifications (best-effort, never fatal)
//! - Form transition hooks (fire-and-forget observers)
//! - The game-system adapter contract (one per supported ruleset)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use formshift_domain::{ActorSnapshot, AbilityFilters, TransformPlan};

// =============================================================================
// Error Types
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HostDocumentError {
    #[error("Actor not found: {0}")]
    ActorNotFound(String),
    #[error("Document operation failed: {0}")]
    Operation(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FlagStoreError {
    #[error("Flag read failed: {0}")]
    Read(String),
    #[error("Flag write failed: {0}")]
    Write(String),
}

#[derive(Debug, thiserror::Error)]
pub enum GameSystemError {
    #[error("Host document error: {0}")]
    Host(#[from] HostDocumentError),
    #[error("Flag store error: {0}")]
    Flags(#[from] FlagStoreError),
    #[error("Plan construction failed: {0}")]
    Plan(String),
}

#[derive(Debug, thiserror::Error)]
#[error("Transition hook failed: {0}")]
pub struct HookError(pub String);

// =============================================================================
// Handles
// =============================================================================

/// Lightweight handle to a live actor document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRef {
    pub id: String,
    pub uuid: String,
    pub name: String,
}

impl ActorRef {
    pub fn new(
        id: impl Into<String>,
        uuid: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            uuid: uuid.into(),
            name: name.into(),
        }
    }
}

/// The acting user, for permission decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
    pub is_gm: bool,
}

impl UserRef {
    pub fn gm(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_gm: true,
        }
    }

    pub fn player(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_gm: false,
        }
    }
}

// =============================================================================
// Host document access
// =============================================================================

/// Actor/item CRUD surface owned by the host.
#[async_trait]
pub trait HostDocumentPort: Send + Sync {
    /// Identifier of the active game system (for adapter detection).
    async fn system_id(&self) -> Result<String, HostDocumentError>;

    /// All actors available in the current session.
    async fn list_actors(&self) -> Result<Vec<ActorRef>, HostDocumentError>;

    /// The actor's full document (system, items, prototypeToken, flags).
    async fn actor_document(&self, actor_id: &str) -> Result<Value, HostDocumentError>;

    /// Apply a partial update to the actor document.
    async fn update_actor(&self, actor_id: &str, update: Value) -> Result<(), HostDocumentError>;

    async fn create_embedded_items(
        &self,
        actor_id: &str,
        items: Vec<Value>,
    ) -> Result<(), HostDocumentError>;

    async fn delete_embedded_items(
        &self,
        actor_id: &str,
        item_ids: Vec<String>,
    ) -> Result<(), HostDocumentError>;

    /// Push token appearance changes to any on-scene representations.
    async fn sync_active_tokens(
        &self,
        actor_id: &str,
        token_update: Value,
    ) -> Result<(), HostDocumentError>;

    /// Resolve an item document by uuid; `None` when it does not exist.
    async fn resolve_item_by_uuid(&self, uuid: &str)
        -> Result<Option<Value>, HostDocumentError>;
}

// =============================================================================
// Flag persistence
// =============================================================================

/// Scoped key/value persistence for this system's payloads.
///
/// Every payload carries its own integer schema `version`; the store itself
/// is shape-agnostic.
#[async_trait]
pub trait FlagStorePort: Send + Sync {
    async fn world_flag(&self, scope: &str, key: &str) -> Result<Option<Value>, FlagStoreError>;
    async fn set_world_flag(
        &self,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError>;

    async fn user_flag(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, FlagStoreError>;
    async fn set_user_flag(
        &self,
        user_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError>;

    async fn actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<Option<Value>, FlagStoreError>;
    async fn set_actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
        value: Value,
    ) -> Result<(), FlagStoreError>;
    async fn clear_actor_flag(
        &self,
        actor_id: &str,
        scope: &str,
        key: &str,
    ) -> Result<(), FlagStoreError>;
}

// =============================================================================
// Notifications and transition hooks
// =============================================================================

/// Best-effort user-facing notices. Implementations must not block or fail;
/// a host without a notification surface can ignore everything.
pub trait NotificationPort: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Why a form transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionReason {
    Transform,
    Revert,
}

/// Which transition hook is being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionHook {
    LeaveForm,
    EnterForm,
}

/// Payload handed to transition observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormTransitionEvent {
    pub reason: TransitionReason,
    pub actor_id: String,
    pub from_form_actor_id: Option<String>,
    pub to_form_actor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_name: Option<String>,
}

/// Fire-and-forget transition observer. Failures are logged by the caller
/// and never abort the operation that emitted the event.
pub trait TransitionHookPort: Send + Sync {
    fn emit(&self, hook: TransitionHook, event: &FormTransitionEvent) -> Result<(), HookError>;
}

// =============================================================================
// Game-system adapter contract
// =============================================================================

/// Input to the plan builder.
#[derive(Debug, Clone)]
pub struct PlanRequest {
    pub base_actor: ActorRef,
    pub form_actor: ActorRef,
    /// The checkpoint snapshot: the base-state reference for this plan.
    pub snapshot: ActorSnapshot,
    pub filters: AbilityFilters,
    pub form_ability_uuids: Vec<String>,
}

/// Options for restoring an actor toward a snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RevertOptions {
    /// Preserve live-progressed fields (current hit points, resource
    /// pools, level-derived data) from the actor's current state instead
    /// of overwriting them with the stale snapshot. Exact restores (crash
    /// rollback) pass `false`.
    pub preserve_base_stats: bool,
}

impl Default for RevertOptions {
    fn default() -> Self {
        Self {
            preserve_base_stats: true,
        }
    }
}

/// Contract a per-ruleset adapter must satisfy.
#[async_trait]
pub trait GameSystemPort: Send + Sync {
    /// Stable adapter identifier (matches the host system id it serves).
    fn id(&self) -> &str;

    /// Whether this adapter serves the currently running host system.
    async fn detect(&self) -> bool;

    /// Whether using an item with this name initiates a transform.
    async fn is_shift_trigger(&self, item_name: &str) -> Result<bool, GameSystemError>;

    /// Deep, independent copy of the actor's mutable state.
    async fn actor_snapshot(&self, actor: &ActorRef) -> Result<ActorSnapshot, GameSystemError>;

    async fn build_transform_plan(
        &self,
        request: PlanRequest,
    ) -> Result<TransformPlan, GameSystemError>;

    /// Apply a plan: delete previously injected items plus base items
    /// outside the keep-list, apply the stat/token patch, sync on-scene
    /// tokens, create the plan's injected items.
    async fn apply_transform(
        &self,
        actor: &ActorRef,
        plan: &TransformPlan,
    ) -> Result<(), GameSystemError>;

    async fn apply_revert(
        &self,
        actor: &ActorRef,
        snapshot: &ActorSnapshot,
        options: RevertOptions,
    ) -> Result<(), GameSystemError>;

    /// Idempotently guarantee the configured trigger item(s) exist on the
    /// actor.
    async fn ensure_trigger_action(&self, actor: &ActorRef) -> Result<(), GameSystemError>;
}
