//! Item-use extraction from chat-message documents.
//!
//! Some host configurations do not fire a usable item-use event; the only
//! observable trace of an item being used is the chat card it produced.
//! This fallback digs the acting actor and item name out of a chat-message
//! document. It is deliberately conservative: anything ambiguous extracts
//! to nothing.

use serde_json::Value;

/// An item use recovered from a chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatItemUse {
    pub actor_id: String,
    pub item_name: String,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn string_field<'a>(record: &'a Value, key: &str) -> Option<&'a str> {
    record.get(key).and_then(Value::as_str)
}

/// The item name as recorded in the message's system data, or parsed out
/// of a `"<Actor>: <Item>"` flavor line.
fn extract_item_name(message: &Value, actor_name: &str) -> Option<String> {
    let system = message.get("system")?;
    let from_system = non_empty(string_field(system, "spellName"))
        .or_else(|| non_empty(string_field(system, "itemName")))
        .or_else(|| non_empty(string_field(system, "name")));
    if let Some(name) = from_system {
        return Some(name.to_string());
    }

    let flavor = non_empty(string_field(message, "flavor"))?;
    let actor_name = actor_name.trim();
    if !actor_name.is_empty() {
        if let Some(rest) = flavor.strip_prefix(&format!("{actor_name}:")) {
            return non_empty(Some(rest)).map(str::to_string);
        }
    }
    let (_, rest) = flavor.split_once(':')?;
    non_empty(Some(rest)).map(str::to_string)
}

/// Extract an item use from a chat-message document.
///
/// Only messages that look like an item activation qualify: the system data
/// must carry an `activation` block or a spell name, and the speaker must
/// name an actor that `actor_name_by_id` can resolve.
pub fn extract_chat_item_use(
    message: &Value,
    actor_name_by_id: impl Fn(&str) -> Option<String>,
) -> Option<ChatItemUse> {
    let system = message.get("system").filter(|value| value.is_object())?;
    let activation_like = system.get("activation").is_some()
        || system.get("spellName").is_some_and(Value::is_string);
    if !activation_like {
        return None;
    }

    let speaker = message.get("speaker").filter(|value| value.is_object())?;
    let actor_id = non_empty(string_field(speaker, "actor"))?;
    let actor_name = actor_name_by_id(actor_id)?;

    let item_name = extract_item_name(message, &actor_name)?;
    Some(ChatItemUse {
        actor_id: actor_id.to_string(),
        item_name,
    })
}
