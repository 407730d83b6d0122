use std::collections::HashMap;
use serde_json::Value;
use crate::protos::Update;

/// Last known value of every observed device property, plus the property
/// list the device announced at subscription time.
///
/// Only the event channel's consumer task writes to it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PropertyMirror {
  values: HashMap<String, Value>,
  available: Vec<String>,
}

impl PropertyMirror {
  pub fn new() -> PropertyMirror {
    PropertyMirror::default()
  }

  pub fn get(&self, property: &str) -> Option<&Value> {
    self.values.get(property)
  }

  pub fn values(&self) -> &HashMap<String, Value> {
    &self.values
  }

  pub fn available_properties(&self) -> &[String] {
    &self.available
  }

  /// Announced properties that have no value yet.
  pub fn missing(&self) -> Vec<&str> {
    self.available.iter()
      .filter(|p| !self.values.contains_key(p.as_str()))
      .map(String::as_str)
      .collect()
  }

  pub fn apply(&mut self, update: Update) {
    match update {
      // a repeated announcement replaces the list, never appends to it
      Update::Discovered(names) => self.available = names,
      Update::Merge(values) => self.values.extend(values),
      Update::Changed { property, value } => {
        self.values.insert(property, value);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::{json, Map};

  fn mirror_with(pairs: &[(&str, Value)]) -> PropertyMirror {
    let mut m = PropertyMirror::new();
    for (k, v) in pairs {
      m.apply(Update::Changed { property: k.to_string(), value: v.clone() });
    }
    m
  }

  #[test]
  fn change_touches_one_key() {
    let mut m = mirror_with(&[("iris", json!(2)), ("gain", json!(18))]);
    m.apply(Update::Changed { property: "iris".into(), value: json!(5) });
    assert_eq!(m.get("iris"), Some(&json!(5)));
    assert_eq!(m.get("gain"), Some(&json!(18)));
    assert_eq!(m.values().len(), 2);
  }

  #[test]
  fn merge_keeps_unrelated_keys() {
    let mut m = mirror_with(&[("z", json!("keep")), ("x", json!(0))]);
    let mut vals = Map::new();
    vals.insert("x".into(), json!(1));
    vals.insert("y".into(), json!(2));
    m.apply(Update::Merge(vals));
    assert_eq!(m.get("x"), Some(&json!(1)));
    assert_eq!(m.get("y"), Some(&json!(2)));
    assert_eq!(m.get("z"), Some(&json!("keep")));
  }

  #[test]
  fn discovery_is_idempotent() {
    let mut m = PropertyMirror::new();
    let names = vec!["a".to_string(), "b".to_string()];
    m.apply(Update::Discovered(names.clone()));
    m.apply(Update::Discovered(names.clone()));
    assert_eq!(m.available_properties(), names.as_slice());
    assert_eq!(m.missing(), vec!["a", "b"]);
    m.apply(Update::Changed { property: "a".into(), value: json!(true) });
    assert_eq!(m.missing(), vec!["b"]);
  }
}
