//! Game-system adapters.
//!
//! One adapter per supported ruleset; each interprets that ruleset's item
//! schema and document layout behind the [`GameSystemPort`] contract.
//!
//! [`GameSystemPort`]: crate::ports::GameSystemPort

mod nimble;

pub use nimble::{NimbleAdapter, NIMBLE_ADAPTER_ID};
