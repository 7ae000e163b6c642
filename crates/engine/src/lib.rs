//! FormShift engine.
//!
//! The async orchestration layer around the pure `formshift-domain` core.
//!
//! ## Structure
//!
//! - `ports` - trait boundaries toward the host environment (documents,
//!   flags, notifications, transition hooks) and the game-system adapter
//!   contract
//! - `config_service` - flag-store-backed configuration with migration and
//!   permission checks
//! - `resolver` - turns form refs into live actor handles
//! - `transform` - the transform/revert state machine with the per-actor
//!   single-flight lock
//! - `chooser` / `trigger` - trigger detection and choice building
//! - `adapter` - the shipped game-system adapter
//! - `registry` - adapter selection by host system detection

pub mod adapter;
pub mod chat_fallback;
pub mod chooser;
pub mod config_service;
pub mod ports;
pub mod registry;
pub mod resolver;
pub mod transform;
pub mod trigger;

pub use chooser::{build_shape_choices, ShapeChoice};
pub use config_service::{ConfigError, ConfigService};
pub use ports::{
    ActorRef, FlagStoreError, FlagStorePort, FormTransitionEvent, GameSystemError,
    GameSystemPort, HookError, HostDocumentError, HostDocumentPort, NotificationPort, PlanRequest,
    RevertOptions, TransitionHook, TransitionHookPort, TransitionReason, UserRef,
};
pub use registry::AdapterRegistry;
pub use resolver::FormResolver;
pub use transform::ShapeshiftService;
pub use trigger::{ItemUse, ShapePrompt, TriggerHandler};
