use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use crate::bmerror::BMResult;

/* Event websocket envelope: {"type": "request"|"response"|"event", "data": {...}}
   There are no request ids: a response can only be told apart by its shape. */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
  Request,
  Response,
  Event,
  Other,
}

impl MessageType {
  fn from_wire(s: &str) -> MessageType {
    match s {
      "request" => MessageType::Request,
      "response" => MessageType::Response,
      "event" => MessageType::Event,
      _ => MessageType::Other,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
  #[serde(rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
  ListProperties,
  Subscribe(Vec<String>),
}

impl Request {
  pub fn envelope(&self) -> Envelope {
    let data = match self {
      Request::ListProperties => json!({"action": "listProperties"}),
      Request::Subscribe(props) => json!({"action": "subscribe", "properties": props}),
    };
    Envelope { kind: "request".to_string(), data }
  }

  pub fn to_text(&self) -> BMResult<String> {
    Ok(serde_json::to_string(&self.envelope())?)
  }
}

/// One change to apply to the local mirror.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
  Discovered(Vec<String>),
  Merge(Map<String, Value>),
  Changed { property: String, value: Value },
}

impl Envelope {
  pub fn parse(text: &str) -> BMResult<Envelope> {
    Ok(serde_json::from_str(text)?)
  }

  pub fn message_type(&self) -> MessageType {
    MessageType::from_wire(&self.kind)
  }

  fn action(&self) -> Option<&str> {
    self.data.get("action").and_then(Value::as_str)
  }

  /// Every update this message carries, in application order. A discovery
  /// reply is also a response, so one message can yield several.
  pub fn updates(&self) -> Vec<Update> {
    let mut ups = Vec::new();
    if self.action() == Some("listProperties") {
      if let Some(props) = self.data.get("properties").and_then(Value::as_array) {
        let names = props.iter().filter_map(Value::as_str).map(str::to_string).collect();
        ups.push(Update::Discovered(names));
      }
    }
    if self.message_type() == MessageType::Response {
      if let Some(values) = self.data.get("values").and_then(Value::as_object) {
        ups.push(Update::Merge(values.clone()));
      }
    }
    if self.action() == Some("propertyValueChanged") {
      if let Some(property) = self.data.get("property").and_then(Value::as_str) {
        let value = self.data.get("value").cloned().unwrap_or(Value::Null);
        ups.push(Update::Changed { property: property.to_string(), value });
      }
    }
    ups
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn requests_on_the_wire() {
    let t: Value = serde_json::from_str(&Request::ListProperties.to_text().unwrap()).unwrap();
    assert_eq!(t, json!({"type": "request", "data": {"action": "listProperties"}}));
    let t: Value = serde_json::from_str(
      &Request::Subscribe(vec!["/video/iris".into()]).to_text().unwrap()).unwrap();
    assert_eq!(t, json!({"type": "request",
      "data": {"action": "subscribe", "properties": ["/video/iris"]}}));
  }

  #[test]
  fn discovery_reply() {
    let e = Envelope::parse(r#"{"type":"response","data":{"action":"listProperties",
      "properties":["a","b"]}}"#).unwrap();
    assert_eq!(e.updates(), vec![Update::Discovered(vec!["a".into(), "b".into()])]);
  }

  #[test]
  fn subscribe_reply_merges_values() {
    let e = Envelope::parse(r#"{"type":"response","data":{"action":"subscribe",
      "properties":["x"],"values":{"x":1,"y":2}}}"#).unwrap();
    let mut m = Map::new();
    m.insert("x".into(), json!(1));
    m.insert("y".into(), json!(2));
    assert_eq!(e.updates(), vec![Update::Merge(m)]);
  }

  #[test]
  fn change_event() {
    let e = Envelope::parse(r#"{"type":"event","data":{"action":"propertyValueChanged",
      "property":"iris","value":5}}"#).unwrap();
    assert_eq!(e.updates(), vec![Update::Changed { property: "iris".into(), value: json!(5) }]);
  }

  #[test]
  fn unknown_shapes_yield_nothing() {
    let e = Envelope::parse(r#"{"type":"notice","data":{"action":"hello"}}"#).unwrap();
    assert_eq!(e.message_type(), MessageType::Other);
    assert!(e.updates().is_empty());
    assert!(Envelope::parse("[1,2]").is_err());
  }
}
