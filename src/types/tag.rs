//! Tag identifiers and values exchanged with the tag server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of a tag on the automation server, e.g. `ns=1;i=100001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(String);

impl TagId {
    /// Create a tag id from its string form.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Numeric node id in namespace 1, the convention used for scanner defaults.
    pub fn numeric(ns: u16, id: u32) -> Self {
        Self(format!("ns={};i={}", ns, id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TagId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A value carried by a tag, with its variant made explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl TagValue {
    /// Whether the controller has confirmed: only a boolean `true` counts.
    pub fn is_confirmation(&self) -> bool {
        matches!(self, Self::Bool(true))
    }

    /// Short name of the variant, for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for TagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for TagValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<f64> for TagValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<String> for TagValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for TagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_tag_id() {
        assert_eq!(TagId::numeric(1, 100001).as_str(), "ns=1;i=100001");
    }

    #[test]
    fn test_only_true_confirms() {
        assert!(TagValue::Bool(true).is_confirmation());
        assert!(!TagValue::Bool(false).is_confirmation());
        assert!(!TagValue::Int(1).is_confirmation());
        assert!(!TagValue::Text("true".into()).is_confirmation());
    }

    #[test]
    fn test_untagged_json_shapes() {
        let values: Vec<TagValue> = serde_json::from_str(r#"[true, 3, 1.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                TagValue::Bool(true),
                TagValue::Int(3),
                TagValue::Float(1.5),
                TagValue::Text("x".into())
            ]
        );
    }
}
