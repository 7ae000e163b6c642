//! Form resolution.
//!
//! Turns a mapping's abstract form refs into live actor handles. Refs may
//! be authored before their actors exist, so unresolvable refs are logged
//! and skipped rather than treated as fatal.

use std::sync::Arc;

use formshift_domain::{EffectiveMapping, FormRef, FormRefMode};

use crate::config_service::ConfigService;
use crate::ports::{ActorRef, HostDocumentPort, UserRef};

pub struct FormResolver {
    host: Arc<dyn HostDocumentPort>,
    config: Arc<ConfigService>,
}

impl FormResolver {
    pub fn new(host: Arc<dyn HostDocumentPort>, config: Arc<ConfigService>) -> Self {
        Self { host, config }
    }

    /// Resolve refs against the current session's actors.
    ///
    /// Uuid refs match an actor's uuid, bare id, or `Actor.<id>` form; name
    /// refs match display names trimmed-equal. Results dedup by actor id
    /// preserving first-seen order.
    pub async fn resolve_form_actors(&self, form_refs: &[FormRef]) -> Vec<ActorRef> {
        let actors = match self.host.list_actors().await {
            Ok(actors) => actors,
            Err(err) => {
                tracing::warn!(error = %err, "Actor listing failed while resolving forms");
                return Vec::new();
            }
        };

        let mut resolved: Vec<ActorRef> = Vec::new();
        for form_ref in form_refs {
            let actor = match form_ref.mode {
                FormRefMode::Uuid => resolve_by_uuid(&actors, &form_ref.value),
                FormRefMode::Name => resolve_by_name(&actors, &form_ref.value),
            };
            let Some(actor) = actor else {
                tracing::warn!(
                    mode = ?form_ref.mode,
                    value = %form_ref.value,
                    "Missing form actor reference"
                );
                continue;
            };
            if !actor.id.is_empty() && !resolved.iter().any(|seen| seen.id == actor.id) {
                resolved.push(actor.clone());
            }
        }
        resolved
    }

    pub async fn resolve_forms_for_mapping(&self, mapping: &EffectiveMapping) -> Vec<ActorRef> {
        self.resolve_form_actors(&mapping.form_refs).await
    }

    /// Resolve the forms mapped to using an item with this name, through
    /// the acting user's effective config.
    pub async fn resolve_forms_for_item_name(
        &self,
        item_name: &str,
        user: Option<&UserRef>,
    ) -> Vec<ActorRef> {
        let effective = self.config.effective_config(user).await;
        match effective.mapping_for_item_name(item_name) {
            Some(mapping) => self.resolve_forms_for_mapping(mapping).await,
            None => Vec::new(),
        }
    }
}

fn resolve_by_uuid<'a>(actors: &'a [ActorRef], value: &str) -> Option<&'a ActorRef> {
    actors.iter().find(|actor| {
        actor.uuid == value || actor.id == value || format!("Actor.{}", actor.id) == value
    })
}

fn resolve_by_name<'a>(actors: &'a [ActorRef], value: &str) -> Option<&'a ActorRef> {
    let wanted = value.trim();
    actors.iter().find(|actor| actor.name.trim() == wanted)
}
