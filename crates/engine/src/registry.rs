//! Adapter selection.

use std::sync::Arc;

use crate::ports::GameSystemPort;

/// Ordered list of known game-system adapters; the first whose `detect()`
/// reports the running host system wins.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn GameSystemPort>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, adapter: Arc<dyn GameSystemPort>) {
        self.adapters.push(adapter);
    }

    pub async fn active_adapter(&self) -> Option<Arc<dyn GameSystemPort>> {
        for adapter in &self.adapters {
            if adapter.detect().await {
                return Some(adapter.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{
        ActorRef, GameSystemError, PlanRequest, RevertOptions,
    };
    use async_trait::async_trait;
    use formshift_domain::{ActorSnapshot, TransformPlan};

    struct StubAdapter {
        id: &'static str,
        detected: bool,
    }

    #[async_trait]
    impl GameSystemPort for StubAdapter {
        fn id(&self) -> &str {
            self.id
        }

        async fn detect(&self) -> bool {
            self.detected
        }

        async fn is_shift_trigger(&self, _item_name: &str) -> Result<bool, GameSystemError> {
            Ok(false)
        }

        async fn actor_snapshot(
            &self,
            _actor: &ActorRef,
        ) -> Result<ActorSnapshot, GameSystemError> {
            Err(GameSystemError::Plan("stub".into()))
        }

        async fn build_transform_plan(
            &self,
            _request: PlanRequest,
        ) -> Result<TransformPlan, GameSystemError> {
            Err(GameSystemError::Plan("stub".into()))
        }

        async fn apply_transform(
            &self,
            _actor: &ActorRef,
            _plan: &TransformPlan,
        ) -> Result<(), GameSystemError> {
            Ok(())
        }

        async fn apply_revert(
            &self,
            _actor: &ActorRef,
            _snapshot: &ActorSnapshot,
            _options: RevertOptions,
        ) -> Result<(), GameSystemError> {
            Ok(())
        }

        async fn ensure_trigger_action(&self, _actor: &ActorRef) -> Result<(), GameSystemError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_detected_adapter_wins() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter {
            id: "first",
            detected: false,
        }));
        registry.register(Arc::new(StubAdapter {
            id: "second",
            detected: true,
        }));
        registry.register(Arc::new(StubAdapter {
            id: "third",
            detected: true,
        }));

        let active = registry.active_adapter().await.map(|adapter| {
            adapter.id().to_string()
        });
        assert_eq!(active, Some("second".to_string()));
    }

    #[tokio::test]
    async fn no_detection_means_no_adapter() {
        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(StubAdapter {
            id: "first",
            detected: false,
        }));
        assert!(registry.active_adapter().await.is_none());
    }
}
