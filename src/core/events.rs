//! Events emitted for downstream monitors.
//!
//! Events are part of the block result, not logs: they are recorded even when the block also logs, and they
//! are dropped together with the block's writes if the block aborts.

use serde::{Deserialize, Serialize};

use crate::core::types::ConsAddress;

pub const EVENT_TYPE_LIVENESS: &str = "liveness";
pub const EVENT_TYPE_SLASH: &str = "slash";

pub const ATTRIBUTE_KEY_ADDRESS: &str = "address";
pub const ATTRIBUTE_KEY_MISSED_BLOCKS: &str = "missed_blocks";
pub const ATTRIBUTE_KEY_HEIGHT: &str = "height";
pub const ATTRIBUTE_KEY_POWER: &str = "power";
pub const ATTRIBUTE_KEY_REASON: &str = "reason";
pub const ATTRIBUTE_KEY_JAILED: &str = "jailed";
pub const ATTRIBUTE_KEY_BURNED_COINS: &str = "burned_coins";

pub const ATTRIBUTE_VALUE_DOUBLE_SIGN: &str = "double_sign";
pub const ATTRIBUTE_VALUE_MISSING_SIGNATURE: &str = "missing_signature";

/// A typed event with ordered string attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn liveness(addr: &ConsAddress, missed_blocks: i64, height: i64) -> Self {
        Event::new(EVENT_TYPE_LIVENESS)
            .with_attribute(ATTRIBUTE_KEY_ADDRESS, addr)
            .with_attribute(ATTRIBUTE_KEY_MISSED_BLOCKS, missed_blocks)
            .with_attribute(ATTRIBUTE_KEY_HEIGHT, height)
    }

    pub fn slash(addr: &ConsAddress, power: i64, reason: &str, burned: u128) -> Self {
        Event::new(EVENT_TYPE_SLASH)
            .with_attribute(ATTRIBUTE_KEY_ADDRESS, addr)
            .with_attribute(ATTRIBUTE_KEY_POWER, power)
            .with_attribute(ATTRIBUTE_KEY_REASON, reason)
            .with_attribute(ATTRIBUTE_KEY_JAILED, addr)
            .with_attribute(ATTRIBUTE_KEY_BURNED_COINS, burned)
    }
}

/// Ordered event log for one block (or one direct call).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventManager {
    events: Vec<Event>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Removes and returns every recorded event.
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn extend(&mut self, events: Vec<Event>) {
        self.events.extend(events);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
