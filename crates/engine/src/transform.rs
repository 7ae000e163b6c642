//! The transform/revert state machine.
//!
//! Owns the per-actor lifecycle of "shaped" vs "original". One service
//! instance holds the process-wide in-flight lock set; a second operation
//! arriving for the same base actor is refused outright, never queued.
//!
//! Failure semantics: refusals (missing ids, base-actor mismatch, lock
//! held, no valid state) return `false` without mutating anything. Mutation
//! failures roll the actor back to the checkpoint taken at the start of the
//! operation and also return `false`. Neither path panics or errors out of
//! the public entry points.

use std::sync::Arc;

use dashmap::DashMap;

use formshift_domain::{ActorShapeState, ActorSnapshot, FLAG_SCOPE};

use crate::config_service::ConfigService;
use crate::ports::{
    ActorRef, FlagStorePort, FormTransitionEvent, GameSystemError, GameSystemPort,
    NotificationPort, PlanRequest, RevertOptions, TransitionHook, TransitionHookPort,
    TransitionReason, UserRef,
};

/// Actor-scoped flag key for the persisted shape state.
pub const STATE_KEY: &str = "state";

/// The per-actor single-flight lock set.
///
/// Only `try_acquire` is exposed; the raw map never leaks, so callers
/// cannot bypass single-flight semantics. Releasing happens on guard drop,
/// which covers every exit path.
struct InFlightLocks {
    held: DashMap<String, ()>,
}

struct LockGuard<'a> {
    locks: &'a InFlightLocks,
    key: String,
}

impl InFlightLocks {
    fn new() -> Self {
        Self {
            held: DashMap::new(),
        }
    }

    fn try_acquire(&self, key: &str) -> Option<LockGuard<'_>> {
        use dashmap::mapref::entry::Entry;
        match self.held.entry(key.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(LockGuard {
                    locks: self,
                    key: key.to_string(),
                })
            }
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.remove(&self.key);
    }
}

/// Filters and extra ability uuids resolved for a triggering item name.
struct MappingContext {
    mapping_id: Option<String>,
    filters: formshift_domain::AbilityFilters,
    form_ability_uuids: Vec<String>,
}

/// The transform/revert state machine.
pub struct ShapeshiftService {
    adapter: Arc<dyn GameSystemPort>,
    flags: Arc<dyn FlagStorePort>,
    config: Arc<ConfigService>,
    notifications: Arc<dyn NotificationPort>,
    hooks: Arc<dyn TransitionHookPort>,
    locks: InFlightLocks,
}

impl ShapeshiftService {
    pub fn new(
        adapter: Arc<dyn GameSystemPort>,
        flags: Arc<dyn FlagStorePort>,
        config: Arc<ConfigService>,
        notifications: Arc<dyn NotificationPort>,
        hooks: Arc<dyn TransitionHookPort>,
    ) -> Self {
        Self {
            adapter,
            flags,
            config,
            notifications,
            hooks,
            locks: InFlightLocks::new(),
        }
    }

    /// The actor's persisted shape state, or `None` when absent or invalid
    /// (invalid payloads are logged and treated as absence).
    pub async fn shape_state(&self, actor_id: &str) -> Option<ActorShapeState> {
        let raw = match self.flags.actor_flag(actor_id, FLAG_SCOPE, STATE_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(actor_id, error = %err, "Shape state read failed");
                return None;
            }
        };
        match ActorShapeState::from_value(&raw) {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!(actor_id, error = %err, "Invalid shape state payload");
                None
            }
        }
    }

    /// Transform `actor` into `form_actor` as triggered by using
    /// `item_name`.
    ///
    /// Returns `true` on success. Refusals and handled failures return
    /// `false`; this method never propagates an error.
    pub async fn apply_form(
        &self,
        actor: &ActorRef,
        form_actor: &ActorRef,
        item_name: &str,
        user: Option<&UserRef>,
    ) -> bool {
        if actor.id.is_empty() || form_actor.id.is_empty() {
            tracing::warn!(
                actor_id = %actor.id,
                form_actor_id = %form_actor.id,
                "Transform refused: actor id missing"
            );
            return false;
        }

        let current_state = self.shape_state(&actor.id).await;
        // A form actor should never itself be mid-transform as a base.
        if let Some(state) = &current_state {
            if state.is_shaped && state.base_actor_id != actor.id {
                tracing::warn!(
                    actor_id = %actor.id,
                    expected_base_actor_id = %state.base_actor_id,
                    "Transform refused: base actor mismatch"
                );
                return false;
            }
        }

        let Some(_guard) = self.locks.try_acquire(&actor.id) else {
            tracing::warn!(actor_id = %actor.id, "Transform refused: operation already in flight");
            return false;
        };

        // Baseline: what "original" means. Reused across form swaps, only
        // recaptured when the actor is not currently shaped.
        let shaped_state = current_state.as_ref().filter(|state| state.is_shaped);
        let baseline = match shaped_state.and_then(ActorShapeState::valid_snapshot) {
            Some(snapshot) => snapshot,
            None => match self.adapter.actor_snapshot(actor).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::error!(actor_id = %actor.id, error = %err, "Baseline snapshot failed");
                    return false;
                }
            },
        };

        // Checkpoint: the rollback target for this operation only.
        let checkpoint = match self.adapter.actor_snapshot(actor).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(actor_id = %actor.id, error = %err, "Checkpoint snapshot failed");
                return false;
            }
        };

        let context = self.mapping_context(item_name, user).await;
        tracing::info!(
            actor_id = %actor.id,
            form_actor_id = %form_actor.id,
            mapping_id = ?context.mapping_id,
            "Transform started"
        );

        let previous_form_actor_id = shaped_state.map(|state| state.current_form_actor_id.clone());
        let base_actor_id = shaped_state
            .map(|state| state.base_actor_id.clone())
            .unwrap_or_else(|| actor.id.clone());

        let outcome = self
            .run_transform(actor, form_actor, &checkpoint, &baseline, &context, &base_actor_id)
            .await;

        match outcome {
            Ok(()) => {
                self.emit_transition_pair(
                    previous_form_actor_id.as_deref(),
                    FormTransitionEvent {
                        reason: TransitionReason::Transform,
                        actor_id: actor.id.clone(),
                        from_form_actor_id: previous_form_actor_id.clone(),
                        to_form_actor_id: Some(form_actor.id.clone()),
                        mapping_id: context.mapping_id.clone(),
                        item_name: Some(item_name.to_string()),
                    },
                );
                tracing::info!(
                    actor_id = %actor.id,
                    form_actor_id = %form_actor.id,
                    "Transform succeeded"
                );
                true
            }
            Err(err) => {
                tracing::error!(
                    actor_id = %actor.id,
                    form_actor_id = %form_actor.id,
                    error = %err,
                    "Transform failed, rolling back to checkpoint"
                );
                self.rollback(actor, &checkpoint).await;
                self.notifications
                    .error("Form transform failed and the actor state was restored.");
                false
            }
        }
    }

    /// Revert `actor` to its baseline, preserving live-progressed stats.
    pub async fn revert_form(&self, actor: &ActorRef) -> bool {
        let Some(state) = self.shape_state(&actor.id).await else {
            tracing::warn!(actor_id = %actor.id, "Revert refused: no shape state");
            return false;
        };
        if !state.is_shaped {
            tracing::warn!(actor_id = %actor.id, "Revert refused: actor is not shaped");
            return false;
        }
        let Some(baseline) = state.valid_snapshot() else {
            tracing::warn!(actor_id = %actor.id, "Revert refused: baseline snapshot invalid");
            return false;
        };

        let Some(_guard) = self.locks.try_acquire(&actor.id) else {
            tracing::warn!(actor_id = %actor.id, "Revert refused: operation already in flight");
            return false;
        };

        let checkpoint = match self.adapter.actor_snapshot(actor).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::error!(actor_id = %actor.id, error = %err, "Checkpoint snapshot failed");
                return false;
            }
        };

        let outcome = self.run_revert(actor, &baseline).await;
        match outcome {
            Ok(()) => {
                self.emit_transition_pair(
                    Some(state.current_form_actor_id.as_str()),
                    FormTransitionEvent {
                        reason: TransitionReason::Revert,
                        actor_id: actor.id.clone(),
                        from_form_actor_id: Some(state.current_form_actor_id.clone()),
                        to_form_actor_id: Some(state.base_actor_id.clone()),
                        mapping_id: None,
                        item_name: None,
                    },
                );
                tracing::info!(actor_id = %actor.id, "Revert succeeded");
                true
            }
            Err(err) => {
                tracing::error!(
                    actor_id = %actor.id,
                    error = %err,
                    "Revert failed, rolling back to checkpoint"
                );
                self.rollback(actor, &checkpoint).await;
                self.notifications
                    .error("Form revert failed and the actor state was restored.");
                false
            }
        }
    }

    async fn run_transform(
        &self,
        actor: &ActorRef,
        form_actor: &ActorRef,
        checkpoint: &ActorSnapshot,
        baseline: &ActorSnapshot,
        context: &MappingContext,
        base_actor_id: &str,
    ) -> Result<(), GameSystemError> {
        let plan = self
            .adapter
            .build_transform_plan(PlanRequest {
                base_actor: actor.clone(),
                form_actor: form_actor.clone(),
                snapshot: checkpoint.clone(),
                filters: context.filters.clone(),
                form_ability_uuids: context.form_ability_uuids.clone(),
            })
            .await?;
        self.adapter.apply_transform(actor, &plan).await?;
        self.adapter.ensure_trigger_action(actor).await?;

        let next_state = ActorShapeState::shaped(
            base_actor_id,
            form_actor.id.as_str(),
            form_actor.name.as_str(),
            baseline,
        );
        self.flags
            .set_actor_flag(&actor.id, FLAG_SCOPE, STATE_KEY, next_state.to_value())
            .await
            .map_err(GameSystemError::Flags)?;
        Ok(())
    }

    async fn run_revert(
        &self,
        actor: &ActorRef,
        baseline: &ActorSnapshot,
    ) -> Result<(), GameSystemError> {
        self.adapter
            .apply_revert(
                actor,
                baseline,
                RevertOptions {
                    preserve_base_stats: true,
                },
            )
            .await?;
        self.adapter.ensure_trigger_action(actor).await?;
        // The state is cleared entirely, not merely flagged off.
        self.flags
            .clear_actor_flag(&actor.id, FLAG_SCOPE, STATE_KEY)
            .await
            .map_err(GameSystemError::Flags)?;
        Ok(())
    }

    /// Best-effort exact restore to the checkpoint. A rollback failure is
    /// the one unrecovered failure mode; it is logged as its own event for
    /// operator follow-up and never propagates.
    async fn rollback(&self, actor: &ActorRef, checkpoint: &ActorSnapshot) {
        if let Err(err) = self
            .adapter
            .apply_revert(
                actor,
                checkpoint,
                RevertOptions {
                    preserve_base_stats: false,
                },
            )
            .await
        {
            tracing::error!(
                actor_id = %actor.id,
                error = %err,
                "Rollback failed; actor may be in an inconsistent state"
            );
        }
    }

    /// Leave-then-enter, both best-effort. The leave event is only emitted
    /// when there actually was a previous form.
    fn emit_transition_pair(&self, previous_form: Option<&str>, enter_event: FormTransitionEvent) {
        if previous_form.is_some() {
            self.emit(TransitionHook::LeaveForm, &enter_event);
        }
        self.emit(TransitionHook::EnterForm, &enter_event);
    }

    fn emit(&self, hook: TransitionHook, event: &FormTransitionEvent) {
        if let Err(err) = self.hooks.emit(hook, event) {
            tracing::warn!(
                actor_id = %event.actor_id,
                hook = ?hook,
                error = %err,
                "Transition hook failed"
            );
        }
    }

    async fn mapping_context(&self, item_name: &str, user: Option<&UserRef>) -> MappingContext {
        let effective = self.config.effective_config(user).await;
        match effective.mapping_for_item_name(item_name) {
            Some(mapping) => MappingContext {
                mapping_id: Some(mapping.id.clone()),
                filters: mapping.filters.clone(),
                form_ability_uuids: mapping.form_ability_uuids.clone().unwrap_or_default(),
            },
            None => MappingContext {
                mapping_id: None,
                filters: formshift_domain::AbilityFilters::default(),
                form_ability_uuids: Vec::new(),
            },
        }
    }
}
