//! Trigger handling.
//!
//! Detects that a mapped item was used, resolves the candidate forms, and
//! produces the choice prompt. Actually rendering the prompt is the host's
//! concern; applying a selected choice comes back through
//! [`TriggerHandler::apply_choice`].

use std::sync::Arc;

use serde_json::Value;

use crate::chat_fallback::extract_chat_item_use;
use crate::chooser::{build_shape_choices, ShapeChoice};
use crate::config_service::ConfigService;
use crate::ports::{ActorRef, HostDocumentPort, NotificationPort, UserRef};
use crate::registry::AdapterRegistry;
use crate::resolver::FormResolver;
use crate::transform::ShapeshiftService;

/// An observed item use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemUse {
    pub item_name: String,
    pub actor_id: Option<String>,
}

/// A ready-to-render chooser prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapePrompt {
    pub actor: ActorRef,
    pub item_name: String,
    pub choices: Vec<ShapeChoice>,
}

pub struct TriggerHandler {
    registry: Arc<AdapterRegistry>,
    host: Arc<dyn HostDocumentPort>,
    config: Arc<ConfigService>,
    resolver: Arc<FormResolver>,
    service: Arc<ShapeshiftService>,
    notifications: Arc<dyn NotificationPort>,
}

impl TriggerHandler {
    pub fn new(
        registry: Arc<AdapterRegistry>,
        host: Arc<dyn HostDocumentPort>,
        config: Arc<ConfigService>,
        resolver: Arc<FormResolver>,
        service: Arc<ShapeshiftService>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Self {
        Self {
            registry,
            host,
            config,
            resolver,
            service,
            notifications,
        }
    }

    /// Handle an item use. Returns the chooser prompt when the item is a
    /// mapped trigger and at least one choice is available.
    pub async fn handle_item_use(
        &self,
        item_use: &ItemUse,
        user: Option<&UserRef>,
    ) -> Option<ShapePrompt> {
        let Some(adapter) = self.registry.active_adapter().await else {
            self.debug_notice("trigger ignored: no active adapter").await;
            return None;
        };

        let is_trigger = match adapter.is_shift_trigger(&item_use.item_name).await {
            Ok(is_trigger) => is_trigger,
            Err(err) => {
                tracing::error!(
                    item_name = %item_use.item_name,
                    error = %err,
                    "Trigger matcher failed"
                );
                self.debug_notice(&format!("trigger matcher failed: {err}")).await;
                return None;
            }
        };
        if !is_trigger {
            self.debug_notice(&format!("trigger ignored: item not mapped ({})", item_use.item_name))
                .await;
            return None;
        }

        let Some(actor) = self.find_actor(item_use.actor_id.as_deref()).await else {
            tracing::warn!(item_name = %item_use.item_name, "Trigger ignored: actor missing");
            self.debug_notice(&format!("trigger ignored: actor missing ({})", item_use.item_name))
                .await;
            return None;
        };

        tracing::info!(
            actor_id = %actor.id,
            item_name = %item_use.item_name,
            "Trigger detected"
        );

        let forms = self
            .resolver
            .resolve_forms_for_item_name(&item_use.item_name, user)
            .await;
        self.debug_notice(&format!(
            "chooser resolved {} forms for \"{}\"",
            forms.len(),
            item_use.item_name
        ))
        .await;

        let state = self.service.shape_state(&actor.id).await;
        let choices = build_shape_choices(state.as_ref(), &forms);
        if choices.is_empty() {
            self.debug_notice(&format!("chooser aborted: no choices for \"{}\"", item_use.item_name))
                .await;
            self.notifications
                .warn("No mapped forms are currently available.");
            return None;
        }

        Some(ShapePrompt {
            actor,
            item_name: item_use.item_name.clone(),
            choices,
        })
    }

    /// Apply a selected choice from a prompt.
    pub async fn apply_choice(
        &self,
        actor: &ActorRef,
        item_name: &str,
        choice: &ShapeChoice,
        user: Option<&UserRef>,
    ) -> bool {
        match choice {
            ShapeChoice::Original => self.service.revert_form(actor).await,
            ShapeChoice::Form(form_actor) => {
                self.service
                    .apply_form(actor, form_actor, item_name, user)
                    .await
            }
        }
    }

    /// Chat-message fallback: recover an item use from a chat card when the
    /// host fires no usable item-use event. Gated by the world config's
    /// `useChatFallback` toggle and limited to the adapter that produces
    /// such cards.
    pub async fn handle_chat_message(
        &self,
        message: &Value,
        user: Option<&UserRef>,
    ) -> Option<ShapePrompt> {
        let Some(adapter) = self.registry.active_adapter().await else {
            return None;
        };
        if adapter.id() != crate::adapter::NIMBLE_ADAPTER_ID {
            self.debug_notice(&format!(
                "chat fallback ignored (adapter mismatch: {})",
                adapter.id()
            ))
            .await;
            return None;
        }
        if !self.config.global_config(user).await.ui.use_chat_fallback {
            return None;
        }

        let actors = match self.host.list_actors().await {
            Ok(actors) => actors,
            Err(err) => {
                tracing::warn!(error = %err, "Actor listing failed in chat fallback");
                return None;
            }
        };
        let item_use = extract_chat_item_use(message, |actor_id| {
            actors
                .iter()
                .find(|actor| actor.id == actor_id)
                .map(|actor| actor.name.clone())
        })?;
        self.debug_notice(&format!("chat fallback extracted item ({})", item_use.item_name))
            .await;

        self.handle_item_use(
            &ItemUse {
                item_name: item_use.item_name,
                actor_id: Some(item_use.actor_id),
            },
            user,
        )
        .await
    }

    async fn find_actor(&self, actor_id: Option<&str>) -> Option<ActorRef> {
        let actor_id = actor_id?;
        if actor_id.is_empty() {
            return None;
        }
        match self.host.list_actors().await {
            Ok(actors) => actors.into_iter().find(|actor| actor.id == actor_id),
            Err(err) => {
                tracing::warn!(actor_id, error = %err, "Actor lookup failed");
                None
            }
        }
    }

    /// Diagnostic notice, shown only when the world config enables debug
    /// logs.
    async fn debug_notice(&self, message: &str) {
        if self.config.debug_logs_enabled().await {
            self.notifications.info(message);
        }
    }
}
