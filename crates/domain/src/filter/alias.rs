//! The fixed alias vocabulary.
//!
//! Legacy content sources classify items with free-text tokens in a variety
//! of fields; this table folds them onto the closed `(axis, value)`
//! vocabulary the rule engine matches against. Alias keys compare after
//! lowercasing and stripping whitespace, `_`, and `-`, so `Class Features`,
//! `class_features`, and `classfeatures` are the same token.

use super::rule::DescriptorAxis;

/// A `(descriptor axis, canonical value)` pair an alias token resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorAlias {
    pub axis: DescriptorAxis,
    pub value: &'static str,
}

const fn alias(axis: DescriptorAxis, value: &'static str) -> DescriptorAlias {
    DescriptorAlias { axis, value }
}

/// Alias tokens accepted in rules and legacy classification fields.
const DESCRIPTOR_ALIASES: &[(&str, DescriptorAlias)] = &[
    ("class", alias(DescriptorAxis::Type, "class")),
    ("subclass", alias(DescriptorAxis::Type, "subclass")),
    ("background", alias(DescriptorAxis::Type, "background")),
    ("ancestry", alias(DescriptorAxis::Type, "ancestry")),
    ("boon", alias(DescriptorAxis::Type, "boon")),
    ("feature", alias(DescriptorAxis::Type, "feature")),
    ("monsterfeature", alias(DescriptorAxis::Type, "monsterfeature")),
    ("spell", alias(DescriptorAxis::Type, "spell")),
    ("object", alias(DescriptorAxis::Type, "object")),
    ("armor", alias(DescriptorAxis::ObjectType, "armor")),
    ("armour", alias(DescriptorAxis::ObjectType, "armor")),
    ("shield", alias(DescriptorAxis::ObjectType, "shield")),
    ("weapon", alias(DescriptorAxis::ObjectType, "weapon")),
    ("weapons", alias(DescriptorAxis::ObjectType, "weapon")),
    ("consumable", alias(DescriptorAxis::ObjectType, "consumable")),
    ("miscellaneous", alias(DescriptorAxis::ObjectType, "misc")),
    ("misc", alias(DescriptorAxis::ObjectType, "misc")),
    ("classfeature", alias(DescriptorAxis::FeatureType, "class")),
    ("classfeatures", alias(DescriptorAxis::FeatureType, "class")),
    ("backgroundfeature", alias(DescriptorAxis::FeatureType, "background")),
    ("backgroundfeatures", alias(DescriptorAxis::FeatureType, "background")),
    ("ancestryfeature", alias(DescriptorAxis::FeatureType, "ancestry")),
    ("ancestryfeatures", alias(DescriptorAxis::FeatureType, "ancestry")),
    ("boonfeature", alias(DescriptorAxis::FeatureType, "boon")),
    ("boonfeatures", alias(DescriptorAxis::FeatureType, "boon")),
];

/// Rule prefixes that name a descriptor axis.
const DESCRIPTOR_PREFIXES: &[(&str, DescriptorAxis)] = &[
    ("type", DescriptorAxis::Type),
    ("itemtype", DescriptorAxis::Type),
    ("objecttype", DescriptorAxis::ObjectType),
    ("featuretype", DescriptorAxis::FeatureType),
];

fn alias_key(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect()
}

/// Resolve an alias token to its descriptor, if the table knows it.
pub fn resolve_alias(value: &str) -> Option<DescriptorAlias> {
    let key = alias_key(value);
    if key.is_empty() {
        return None;
    }
    DESCRIPTOR_ALIASES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, alias)| *alias)
}

/// Resolve a rule prefix to an axis, if it names one.
pub(crate) fn resolve_descriptor_prefix(value: &str) -> Option<DescriptorAxis> {
    let key = alias_key(value);
    if key.is_empty() {
        return None;
    }
    DESCRIPTOR_PREFIXES
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, axis)| *axis)
}
