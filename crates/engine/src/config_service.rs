//! Flag-store-backed configuration service.
//!
//! Reads apply migration and normalization and never fail: an invalid or
//! unreadable payload is logged and replaced by the documented default.
//! Writes validate strictly and enforce the permission model (GM for the
//! world config; self-with-grant or GM for player overrides). Migrated
//! payloads are persisted back best-effort when the acting user may write
//! the target scope.

use std::sync::Arc;

use serde_json::Value;

use formshift_domain::{
    merge_effective_config, migrate_global_config, migrate_player_override,
    normalize_global_config, normalize_player_override, DomainError, EffectiveConfig,
    GlobalConfig, PlayerOverrideConfig, FLAG_SCOPE, LEGACY_FLAG_SCOPE, SCHEMA_VERSION,
};

use crate::ports::{FlagStoreError, FlagStorePort, UserRef};

/// World-scoped flag key for the global config payload.
pub const GLOBAL_CONFIG_KEY: &str = "globalConfig";
/// User-scoped flag key for the player override payload.
pub const PLAYER_OVERRIDE_KEY: &str = "playerOverride";

/// Errors surfaced by configuration writes. Reads never error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid configuration payload: {0}")]
    InvalidPayload(#[from] DomainError),
    #[error("Flag store error: {0}")]
    Store(#[from] FlagStoreError),
}

/// Configuration access for the rest of the engine.
pub struct ConfigService {
    flags: Arc<dyn FlagStorePort>,
}

impl ConfigService {
    pub fn new(flags: Arc<dyn FlagStorePort>) -> Self {
        Self { flags }
    }

    /// The world configuration, migrated and normalized.
    ///
    /// `user` is only consulted for migration persistence (GMs write the
    /// lifted payload back; everyone else keeps it in memory).
    pub async fn global_config(&self, user: Option<&UserRef>) -> GlobalConfig {
        let raw = match self.flags.world_flag(FLAG_SCOPE, GLOBAL_CONFIG_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return GlobalConfig::default(),
            Err(err) => {
                tracing::warn!(error = %err, "Global config read failed, using defaults");
                return GlobalConfig::default();
            }
        };

        let outcome = migrate_global_config(&raw);
        let Some(config) = outcome.config else {
            tracing::warn!(
                from_version = ?outcome.from_version,
                "Invalid global config payload, using defaults"
            );
            return GlobalConfig::default();
        };
        let normalized = normalize_global_config(&config);

        if outcome.migrated {
            let can_persist = user.is_some_and(|user| user.is_gm);
            if can_persist {
                if let Err(err) = self
                    .flags
                    .set_world_flag(
                        FLAG_SCOPE,
                        GLOBAL_CONFIG_KEY,
                        serde_json::to_value(&normalized).unwrap_or(Value::Null),
                    )
                    .await
                {
                    tracing::warn!(
                        error = %err,
                        from_version = ?outcome.from_version,
                        "Failed to persist migrated global config"
                    );
                }
            }
            tracing::info!(
                from_version = ?outcome.from_version,
                to_version = SCHEMA_VERSION,
                persisted = can_persist,
                "Global config migration applied"
            );
        }

        normalized
    }

    /// Replace the world configuration. GM only.
    pub async fn set_global_config(
        &self,
        user: &UserRef,
        config: &GlobalConfig,
    ) -> Result<(), ConfigError> {
        if !user.is_gm {
            return Err(ConfigError::PermissionDenied(
                "only GMs can update the global config".into(),
            ));
        }
        config.validate()?;
        let normalized = normalize_global_config(config);
        self.flags
            .set_world_flag(
                FLAG_SCOPE,
                GLOBAL_CONFIG_KEY,
                serde_json::to_value(&normalized).unwrap_or(Value::Null),
            )
            .await?;
        Ok(())
    }

    /// Whether `current` may edit `target`'s override: GMs always; players
    /// only their own, and only when granted in the global permissions.
    pub fn can_edit_player_override(
        current: &UserRef,
        target: &UserRef,
        global: &GlobalConfig,
    ) -> bool {
        if current.is_gm {
            return true;
        }
        if current.id.is_empty() || target.id.is_empty() || current.id != target.id {
            return false;
        }
        global
            .permissions
            .player_override_editors
            .contains(&current.id)
    }

    /// The target user's override payload, migrated and normalized.
    ///
    /// Falls back to the legacy flag scope for payloads written by earlier
    /// releases; the current scope always wins when both exist.
    pub async fn player_override(
        &self,
        current: Option<&UserRef>,
        target: &UserRef,
    ) -> PlayerOverrideConfig {
        let raw = match self.read_override_flag(&target.id).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return PlayerOverrideConfig::default(),
            Err(err) => {
                tracing::warn!(
                    user_id = %target.id,
                    error = %err,
                    "Player override read failed, using defaults"
                );
                return PlayerOverrideConfig::default();
            }
        };

        let outcome = migrate_player_override(&raw);
        let Some(config) = outcome.config else {
            tracing::warn!(
                user_id = %target.id,
                from_version = ?outcome.from_version,
                "Invalid player override payload, using defaults"
            );
            return PlayerOverrideConfig::default();
        };
        let normalized = normalize_player_override(&config);

        if outcome.migrated {
            let can_persist = match current {
                Some(current) => {
                    let global = self.global_config(Some(current)).await;
                    Self::can_edit_player_override(current, target, &global)
                }
                None => false,
            };
            if can_persist {
                if let Err(err) = self
                    .flags
                    .set_user_flag(
                        &target.id,
                        FLAG_SCOPE,
                        PLAYER_OVERRIDE_KEY,
                        serde_json::to_value(&normalized).unwrap_or(Value::Null),
                    )
                    .await
                {
                    tracing::warn!(
                        user_id = %target.id,
                        error = %err,
                        "Failed to persist migrated player override"
                    );
                }
            }
            tracing::info!(
                user_id = %target.id,
                from_version = ?outcome.from_version,
                to_version = SCHEMA_VERSION,
                persisted = can_persist,
                "Player override migration applied"
            );
        }

        normalized
    }

    /// Replace a user's override payload, permission-checked.
    pub async fn set_player_override(
        &self,
        current: &UserRef,
        target: &UserRef,
        config: &PlayerOverrideConfig,
    ) -> Result<(), ConfigError> {
        let global = self.global_config(Some(current)).await;
        if !Self::can_edit_player_override(current, target, &global) {
            return Err(ConfigError::PermissionDenied(
                "current user may not edit this player override".into(),
            ));
        }
        config.validate()?;
        let normalized = normalize_player_override(config);
        self.flags
            .set_user_flag(
                &target.id,
                FLAG_SCOPE,
                PLAYER_OVERRIDE_KEY,
                serde_json::to_value(&normalized).unwrap_or(Value::Null),
            )
            .await?;
        Ok(())
    }

    /// Merge the world config with `user`'s override. When no user is
    /// acting (e.g. system-initiated checks), the override layer is empty.
    pub async fn effective_config(&self, user: Option<&UserRef>) -> EffectiveConfig {
        let global = self.global_config(user).await;
        let player_override = match user {
            Some(user) => self.player_override(Some(user), user).await,
            None => PlayerOverrideConfig::default(),
        };
        merge_effective_config(&global, &player_override)
    }

    /// Whether diagnostic notices are enabled, read without triggering
    /// migration side effects.
    pub async fn debug_logs_enabled(&self) -> bool {
        match self.flags.world_flag(FLAG_SCOPE, GLOBAL_CONFIG_KEY).await {
            Ok(Some(raw)) => serde_json::from_value::<GlobalConfig>(raw)
                .map(|config| config.ui.show_debug_logs)
                .unwrap_or(false),
            _ => false,
        }
    }

    async fn read_override_flag(&self, user_id: &str) -> Result<Option<Value>, FlagStoreError> {
        if let Some(raw) = self
            .flags
            .user_flag(user_id, FLAG_SCOPE, PLAYER_OVERRIDE_KEY)
            .await?
        {
            return Ok(Some(raw));
        }
        self.flags
            .user_flag(user_id, LEGACY_FLAG_SCOPE, PLAYER_OVERRIDE_KEY)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use formshift_domain::{
        AbilityFilters, FormMapping, FormRef, GlobalPermissions, GlobalUi, MappingTrigger,
    };
    use serde_json::json;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory flag store with optional read failure injection.
    #[derive(Default)]
    struct MemoryFlags {
        world: Mutex<HashMap<(String, String), Value>>,
        user: Mutex<HashMap<(String, String, String), Value>>,
        fail_reads: bool,
    }

    impl MemoryFlags {
        async fn seed_world(&self, key: &str, value: Value) {
            self.world
                .lock()
                .await
                .insert((FLAG_SCOPE.to_string(), key.to_string()), value);
        }

        async fn seed_user(&self, user_id: &str, scope: &str, value: Value) {
            self.user.lock().await.insert(
                (
                    user_id.to_string(),
                    scope.to_string(),
                    PLAYER_OVERRIDE_KEY.to_string(),
                ),
                value,
            );
        }
    }

    #[async_trait]
    impl FlagStorePort for MemoryFlags {
        async fn world_flag(
            &self,
            scope: &str,
            key: &str,
        ) -> Result<Option<Value>, FlagStoreError> {
            if self.fail_reads {
                return Err(FlagStoreError::Read("offline".into()));
            }
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
            if self.fail_reads {
                return Err(FlagStoreError::Read("offline".into()));
            }
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
            _actor_id: &str,
            _scope: &str,
            _key: &str,
        ) -> Result<Option<Value>, FlagStoreError> {
            Ok(None)
        }

        async fn set_actor_flag(
            &self,
            _actor_id: &str,
            _scope: &str,
            _key: &str,
            _value: Value,
        ) -> Result<(), FlagStoreError> {
            Ok(())
        }

        async fn clear_actor_flag(
            &self,
            _actor_id: &str,
            _scope: &str,
            _key: &str,
        ) -> Result<(), FlagStoreError> {
            Ok(())
        }
    }

    fn service(flags: MemoryFlags) -> (ConfigService, Arc<MemoryFlags>) {
        let flags = Arc::new(flags);
        (ConfigService::new(flags.clone()), flags)
    }

    fn global_with_mapping() -> GlobalConfig {
        GlobalConfig {
            version: SCHEMA_VERSION,
            mappings: vec![FormMapping {
                id: "map_1".into(),
                trigger: MappingTrigger::item_name("Wildshape"),
                form_refs: vec![FormRef::name("Wolf Form")],
                default_filters: AbilityFilters::default(),
                form_ability_uuids: None,
            }],
            permissions: GlobalPermissions {
                player_override_editors: vec!["player1".into()],
            },
            ui: GlobalUi::default(),
        }
    }

    mod global_reads {
        use super::*;

        #[tokio::test]
        async fn missing_flag_yields_default() {
            let (service, _) = service(MemoryFlags::default());
            assert_eq!(service.global_config(None).await, GlobalConfig::default());
        }

        #[tokio::test]
        async fn read_failure_yields_default() {
            let (service, _) = service(MemoryFlags {
                fail_reads: true,
                ..Default::default()
            });
            assert_eq!(service.global_config(None).await, GlobalConfig::default());
        }

        #[tokio::test]
        async fn invalid_payload_yields_default() {
            let flags = MemoryFlags::default();
            flags.seed_world(GLOBAL_CONFIG_KEY, json!({ "version": 9 })).await;
            let (service, _) = service(flags);
            assert_eq!(service.global_config(None).await, GlobalConfig::default());
        }

        #[tokio::test]
        async fn gm_read_persists_migrated_payload() {
            let flags = MemoryFlags::default();
            flags
                .seed_world(GLOBAL_CONFIG_KEY, json!({ "version": 0, "mappings": [] }))
                .await;
            let (service, flags) = service(flags);

            let gm = UserRef::gm("gm1");
            let config = service.global_config(Some(&gm)).await;
            assert_eq!(config.version, SCHEMA_VERSION);

            let persisted = flags
                .world_flag(FLAG_SCOPE, GLOBAL_CONFIG_KEY)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(persisted["version"], json!(SCHEMA_VERSION));
        }

        #[tokio::test]
        async fn player_read_does_not_persist_migration() {
            let flags = MemoryFlags::default();
            flags
                .seed_world(GLOBAL_CONFIG_KEY, json!({ "version": 0, "mappings": [] }))
                .await;
            let (service, flags) = service(flags);

            let player = UserRef::player("player1");
            service.global_config(Some(&player)).await;

            let persisted = flags
                .world_flag(FLAG_SCOPE, GLOBAL_CONFIG_KEY)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(persisted["version"], json!(0));
        }
    }

    mod global_writes {
        use super::*;

        #[tokio::test]
        async fn gm_write_normalizes_and_persists() {
            let (service, flags) = service(MemoryFlags::default());
            let gm = UserRef::gm("gm1");
            service
                .set_global_config(&gm, &global_with_mapping())
                .await
                .unwrap();

            let persisted = flags
                .world_flag(FLAG_SCOPE, GLOBAL_CONFIG_KEY)
                .await
                .unwrap()
                .unwrap();
            // Empty filter lists were defaulted during normalization.
            assert!(!persisted["mappings"][0]["defaultFilters"]["whitelist"]
                .as_array()
                .unwrap()
                .is_empty());
        }

        #[tokio::test]
        async fn player_write_is_refused() {
            let (service, _) = service(MemoryFlags::default());
            let player = UserRef::player("player1");
            let result = service.set_global_config(&player, &global_with_mapping()).await;
            assert!(matches!(result, Err(ConfigError::PermissionDenied(_))));
        }

        #[tokio::test]
        async fn invalid_payload_is_refused() {
            let (service, _) = service(MemoryFlags::default());
            let gm = UserRef::gm("gm1");
            let mut config = global_with_mapping();
            config.mappings[0].id = "  ".into();
            let result = service.set_global_config(&gm, &config).await;
            assert!(matches!(result, Err(ConfigError::InvalidPayload(_))));
        }
    }

    mod override_permissions {
        use super::*;

        #[test]
        fn gm_may_edit_anyone() {
            let global = global_with_mapping();
            assert!(ConfigService::can_edit_player_override(
                &UserRef::gm("gm1"),
                &UserRef::player("player2"),
                &global,
            ));
        }

        #[test]
        fn granted_player_may_edit_self_only() {
            let global = global_with_mapping();
            let player = UserRef::player("player1");
            assert!(ConfigService::can_edit_player_override(
                &player,
                &player,
                &global
            ));
            assert!(!ConfigService::can_edit_player_override(
                &player,
                &UserRef::player("player2"),
                &global,
            ));
        }

        #[test]
        fn ungranted_player_may_not_edit() {
            let global = global_with_mapping();
            let player = UserRef::player("player9");
            assert!(!ConfigService::can_edit_player_override(
                &player,
                &player,
                &global
            ));
        }
    }

    mod override_reads {
        use super::*;

        #[tokio::test]
        async fn legacy_scope_is_read_when_current_scope_is_empty() {
            let flags = MemoryFlags::default();
            flags
                .seed_user(
                    "player1",
                    LEGACY_FLAG_SCOPE,
                    json!({
                        "version": 1,
                        "mappings": [{
                            "id": "map_1",
                            "formRefsAdd": [],
                            "formRefsRemove": [],
                        }],
                    }),
                )
                .await;
            let (service, _) = service(flags);

            let target = UserRef::player("player1");
            let config = service.player_override(None, &target).await;
            assert_eq!(config.mappings.len(), 1);
        }

        #[tokio::test]
        async fn current_scope_wins_over_legacy() {
            let flags = MemoryFlags::default();
            flags
                .seed_user("player1", FLAG_SCOPE, json!({ "version": 1, "mappings": [] }))
                .await;
            flags
                .seed_user(
                    "player1",
                    LEGACY_FLAG_SCOPE,
                    json!({
                        "version": 1,
                        "mappings": [{
                            "id": "legacy",
                            "formRefsAdd": [],
                            "formRefsRemove": [],
                        }],
                    }),
                )
                .await;
            let (service, _) = service(flags);

            let target = UserRef::player("player1");
            let config = service.player_override(None, &target).await;
            assert!(config.mappings.is_empty());
        }

        #[tokio::test]
        async fn invalid_payload_yields_default() {
            let flags = MemoryFlags::default();
            flags
                .seed_user("player1", FLAG_SCOPE, json!({ "version": 5, "mappings": [] }))
                .await;
            let (service, _) = service(flags);

            let target = UserRef::player("player1");
            assert_eq!(
                service.player_override(None, &target).await,
                PlayerOverrideConfig::default()
            );
        }
    }

    mod effective {
        use super::*;

        #[tokio::test]
        async fn merges_global_with_the_users_override() {
            let flags = MemoryFlags::default();
            flags
                .seed_world(
                    GLOBAL_CONFIG_KEY,
                    serde_json::to_value(global_with_mapping()).unwrap(),
                )
                .await;
            flags
                .seed_user(
                    "player1",
                    FLAG_SCOPE,
                    json!({
                        "version": 1,
                        "mappings": [{
                            "id": "map_1",
                            "formRefsAdd": [{ "mode": "name", "value": "Panther Form" }],
                            "formRefsRemove": [],
                        }],
                    }),
                )
                .await;
            let (service, _) = service(flags);

            let player = UserRef::player("player1");
            let effective = service.effective_config(Some(&player)).await;
            assert_eq!(effective.mappings[0].form_refs.len(), 2);
        }

        #[tokio::test]
        async fn no_acting_user_means_no_override_layer() {
            let flags = MemoryFlags::default();
            flags
                .seed_world(
                    GLOBAL_CONFIG_KEY,
                    serde_json::to_value(global_with_mapping()).unwrap(),
                )
                .await;
            let (service, _) = service(flags);

            let effective = service.effective_config(None).await;
            assert_eq!(effective.mappings[0].form_refs.len(), 1);
        }
    }
}
