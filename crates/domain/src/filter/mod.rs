//! The filter rule engine.
//!
//! Decides, for a given item record, whether it accompanies a form
//! transform. Four pieces:
//!
//! - `rule` - the whitelist/blacklist rule string grammar
//! - `alias` - the fixed vocabulary that folds legacy free-text
//!   classification tokens onto a small closed descriptor set
//! - `descriptors` - duck-typed classification of item records
//! - `select` - the deterministic inclusion/exclusion policy
//!
//! Everything here is pure: matching depends only on the item's own fields.

mod alias;
mod descriptors;
mod rule;
mod select;

pub use alias::{resolve_alias, DescriptorAlias};
pub use descriptors::{classify, ItemDescriptors};
pub use rule::{parse_rule, parse_rules, DescriptorAxis, FilterRule};
pub use select::{items_by_ids, select_item_ids, SelectOptions, TRIGGER_ACTION_NAME};
