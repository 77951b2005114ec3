//! Component message envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::component::{ComponentId, Payload};

/// Event name broadcast after a successful hot-swap.
pub const COMPONENT_UPDATED: &str = "component-updated";

/// Message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Command,
    Query,
    Event,
    Response,
    Custom(String),
}

/// Where a message is headed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum Destination {
    Component(ComponentId),
    Broadcast,
}

/// A message between components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMessage {
    pub id: Uuid,
    pub source: ComponentId,
    pub destination: Destination,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub payload: Payload,
    pub timestamp: DateTime<Utc>,
}

impl ComponentMessage {
    pub fn new(source: impl Into<ComponentId>, destination: Destination, kind: MessageType) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            destination,
            kind,
            payload: Payload::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn to(source: impl Into<ComponentId>, destination: impl Into<ComponentId>, kind: MessageType) -> Self {
        Self::new(source, Destination::Component(destination.into()), kind)
    }

    /// Broadcast `event` message carrying `event = name`.
    pub fn event(source: impl Into<ComponentId>, name: &str) -> Self {
        Self::new(source, Destination::Broadcast, MessageType::Event).with_payload("event", name)
    }

    /// Insert or replace one payload key.
    pub fn with_payload(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Response addressed back to this message's source.
    pub fn reply(&self, responder: &ComponentId, payload: Payload) -> Self {
        let mut response = Self::to(responder.clone(), self.source.clone(), MessageType::Response);
        response.payload = payload;
        response.payload.insert("in_reply_to".to_string(), self.id.to_string().into());
        response
    }

    pub fn event_name(&self) -> Option<&str> {
        if self.kind != MessageType::Event {
            return None;
        }
        self.payload.get("event").and_then(|v| v.as_str())
    }

    pub fn is_broadcast(&self) -> bool {
        self.destination == Destination::Broadcast
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_helper() {
        let msg = ComponentMessage::event("swap", COMPONENT_UPDATED).with_payload("version", "1.0.1");
        assert!(msg.is_broadcast());
        assert_eq!(msg.event_name(), Some(COMPONENT_UPDATED));
        assert_eq!(msg.payload.len(), 2);
    }

    #[test]
    fn test_payload_keys_are_unique() {
        let msg = ComponentMessage::to("a", "b", MessageType::Command)
            .with_payload("k", 1)
            .with_payload("k", 2);
        assert_eq!(msg.payload.len(), 1);
        assert_eq!(msg.payload["k"], serde_json::json!(2));
    }

    #[test]
    fn test_reply_targets_source() {
        let query = ComponentMessage::to("a", "b", MessageType::Query);
        let reply = query.reply(&ComponentId::new("b"), Payload::new());
        assert_eq!(reply.destination, Destination::Component(ComponentId::new("a")));
        assert_eq!(reply.kind, MessageType::Response);
        assert_eq!(reply.payload["in_reply_to"], serde_json::json!(query.id.to_string()));
    }

    #[test]
    fn test_serializes_type_field() {
        let msg = ComponentMessage::to("a", "b", MessageType::Custom("ping".into()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], serde_json::json!({"custom": "ping"}));
        assert_eq!(json["destination"]["kind"], "component");
    }
}
