//! Duck-typed item classification.
//!
//! Content from different sources records an item's kind in different
//! places: the `type` field, legacy fields like `itemType` or `category`,
//! or nested `system`/`system.details` sub-objects. Classification inspects
//! all of them, folds every discovered token through the alias table, and
//! produces one descriptor set per axis. Callers never need to know which
//! field a particular source used.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::item::ItemRecord;

use super::alias::resolve_alias;
use super::rule::{normalize_descriptor_value, normalize_token, DescriptorAxis};

/// Legacy fields whose tokens only count when the alias table knows them.
const LEGACY_TYPE_KEYS: &[&str] = &[
    "type",
    "itemType",
    "category",
    "classification",
    "kind",
    "group",
    "weaponType",
    "equipmentType",
];

/// Keys traversed one level deep when a classification field holds a record
/// instead of a plain string.
const NESTED_TOKEN_KEYS: &[&str] = &[
    "value",
    "id",
    "name",
    "label",
    "slug",
    "type",
    "category",
    "classification",
];

/// The classification computed for one item: one value set per axis.
///
/// Sets are ordered so classification output is stable for tests and
/// diffing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDescriptors {
    pub types: BTreeSet<String>,
    pub object_types: BTreeSet<String>,
    pub feature_types: BTreeSet<String>,
}

impl ItemDescriptors {
    pub fn contains(&self, axis: DescriptorAxis, value: &str) -> bool {
        self.axis(axis).contains(value)
    }

    pub fn axis(&self, axis: DescriptorAxis) -> &BTreeSet<String> {
        match axis {
            DescriptorAxis::Type => &self.types,
            DescriptorAxis::ObjectType => &self.object_types,
            DescriptorAxis::FeatureType => &self.feature_types,
        }
    }

    fn add(&mut self, axis: DescriptorAxis, token: &str) {
        let normalized = normalize_descriptor_value(axis, token);
        if normalized.is_empty() {
            return;
        }
        match axis {
            DescriptorAxis::Type => self.types.insert(normalized),
            DescriptorAxis::ObjectType => self.object_types.insert(normalized),
            DescriptorAxis::FeatureType => self.feature_types.insert(normalized),
        };
    }

    fn add_alias(&mut self, token: &str) {
        if let Some(alias) = resolve_alias(token) {
            match alias.axis {
                DescriptorAxis::Type => self.types.insert(alias.value.to_string()),
                DescriptorAxis::ObjectType => self.object_types.insert(alias.value.to_string()),
                DescriptorAxis::FeatureType => self.feature_types.insert(alias.value.to_string()),
            };
        }
    }
}

/// Collect normalized string tokens from a classification field value.
///
/// Strings yield their normalized form; records are traversed one level via
/// [`NESTED_TOKEN_KEYS`]; anything else yields nothing.
fn collect_tokens(value: Option<&Value>, allow_traversal: bool, collect: &mut dyn FnMut(&str)) {
    let Some(value) = value else {
        return;
    };
    if let Some(text) = value.as_str() {
        let normalized = normalize_token(text);
        if !normalized.is_empty() {
            collect(&normalized);
        }
        return;
    }
    if !allow_traversal {
        return;
    }
    let Some(map) = value.as_object() else {
        return;
    };
    for key in NESTED_TOKEN_KEYS {
        collect_tokens(map.get(*key), false, collect);
    }
}

fn classify_section(descriptors: &mut ItemDescriptors, section: &Value) {
    let Some(section) = section.as_object() else {
        return;
    };
    collect_tokens(section.get("objectType"), true, &mut |token| {
        descriptors.add(DescriptorAxis::ObjectType, token);
    });
    collect_tokens(section.get("featureType"), true, &mut |token| {
        descriptors.add(DescriptorAxis::FeatureType, token);
    });
    for key in LEGACY_TYPE_KEYS {
        collect_tokens(section.get(*key), true, &mut |token| {
            descriptors.add_alias(token);
        });
    }
}

/// Compute the descriptor set for one item record.
///
/// Pure: depends only on the item's own fields.
pub fn classify(item: &ItemRecord<'_>) -> ItemDescriptors {
    let mut descriptors = ItemDescriptors::default();

    // The item's own `type` both lands on the type axis and feeds the alias
    // table (so `type: "weapon"` also classifies as objecttype:weapon).
    collect_tokens(item.type_value(), true, &mut |token| {
        descriptors.add(DescriptorAxis::Type, token);
        descriptors.add_alias(token);
    });

    if let Some(system) = item.system() {
        classify_section(&mut descriptors, system);
        if let Some(details) = system.get("details") {
            classify_section(&mut descriptors, details);
        }
    }

    // Generic objects with no recorded object type default to the misc
    // bucket so `objecttype:misc` rules can reach them.
    if descriptors.types.contains("object") && descriptors.object_types.is_empty() {
        descriptors.object_types.insert("misc".into());
    }

    descriptors
}
