use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Semantic type of a custom variable or input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "string")]
    Text,
    #[serde(rename = "boolean")]
    Flag,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::Text => "string",
            ValueType::Flag => "boolean",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "number" => Ok(ValueType::Number),
            "string" => Ok(ValueType::Text),
            "boolean" => Ok(ValueType::Flag),
            other => Err(format!("unknown value type: {other}")),
        }
    }
}

/// A stored value tagged with its semantic type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "value")]
pub enum LookupValue {
    #[serde(rename = "number")]
    Number(f64),
    #[serde(rename = "string")]
    Text(String),
    #[serde(rename = "boolean")]
    Flag(bool),
}

impl LookupValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            LookupValue::Number(_) => ValueType::Number,
            LookupValue::Text(_) => ValueType::Text,
            LookupValue::Flag(_) => ValueType::Flag,
        }
    }

    /// Column representation used by the store.
    pub fn encode(&self) -> String {
        match self {
            LookupValue::Number(value) => value.to_string(),
            LookupValue::Text(value) => value.clone(),
            LookupValue::Flag(value) => value.to_string(),
        }
    }

    /// Inverse of [`LookupValue::encode`]; `None` when `raw` does not fit `value_type`.
    pub fn decode(value_type: ValueType, raw: &str) -> Option<Self> {
        match value_type {
            ValueType::Number => raw.trim().parse::<f64>().ok().map(LookupValue::Number),
            ValueType::Text => Some(LookupValue::Text(raw.to_string())),
            ValueType::Flag => match raw.trim() {
                "true" => Some(LookupValue::Flag(true)),
                "false" => Some(LookupValue::Flag(false)),
                _ => None,
            },
        }
    }
}

impl fmt::Display for LookupValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<f64> for LookupValue {
    fn from(value: f64) -> Self {
        LookupValue::Number(value)
    }
}

impl From<i64> for LookupValue {
    fn from(value: i64) -> Self {
        LookupValue::Number(value as f64)
    }
}

impl From<i32> for LookupValue {
    fn from(value: i32) -> Self {
        LookupValue::Number(f64::from(value))
    }
}

impl From<bool> for LookupValue {
    fn from(value: bool) -> Self {
        LookupValue::Flag(value)
    }
}

impl From<&str> for LookupValue {
    fn from(value: &str) -> Self {
        LookupValue::Text(value.to_string())
    }
}

impl From<String> for LookupValue {
    fn from(value: String) -> Self {
        LookupValue::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_values_decode_to_the_same_value() {
        for value in [
            LookupValue::Number(1.1),
            LookupValue::Number(-3.0),
            LookupValue::Text("pine, 2x4".into()),
            LookupValue::Text(String::new()),
            LookupValue::Flag(true),
            LookupValue::Flag(false),
        ] {
            let decoded = LookupValue::decode(value.value_type(), &value.encode());
            assert_eq!(decoded, Some(value));
        }
    }

    #[test]
    fn decode_rejects_mismatched_raw_values() {
        assert_eq!(LookupValue::decode(ValueType::Number, "ten"), None);
        assert_eq!(LookupValue::decode(ValueType::Flag, "yes"), None);
    }

    #[test]
    fn value_type_names_match_storage_labels() {
        assert_eq!("string".parse::<ValueType>(), Ok(ValueType::Text));
        assert_eq!(ValueType::Flag.as_str(), "boolean");
        assert!("date".parse::<ValueType>().is_err());
    }
}
