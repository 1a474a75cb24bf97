//! Raw smart process items as returned by `crm.item.list`

use serde_json::{Map, Value};

/// One CRM item with case-tolerant field lookup.
///
/// Bitrix24 returns custom fields as `ufCrm87_...` from `crm.item.list` but
/// as `UF_CRM_...`-style upper-case keys from older methods, and the same
/// portal may mix the two.
#[derive(Debug, Clone, Default)]
pub struct RawRecord {
    fields: Map<String, Value>,
}

impl RawRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Wrap a JSON value; anything other than an object yields `None`
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self::new(fields)),
            _ => None,
        }
    }

    /// Look up `key` as given, then its upper-cased form.
    /// An explicit `null` counts as absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields
            .get(key)
            .filter(|v| !v.is_null())
            .or_else(|| self.fields.get(&key.to_uppercase()).filter(|v| !v.is_null()))
    }

    /// Field rendered as a non-empty trimmed string
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(value_to_string)
    }

    /// Record id for diagnostics, "?" when missing
    pub fn id(&self) -> String {
        self.get_str("id").unwrap_or_else(|| "?".to_string())
    }
}

/// Scalar JSON value as a trimmed string; blank strings, arrays and objects
/// yield `None`
pub fn value_to_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_get_prefers_exact_key() {
        let raw = record(json!({ "ufCrm87_1": "camel", "UFCRM87_1": "upper" }));
        assert_eq!(raw.get_str("ufCrm87_1").as_deref(), Some("camel"));
    }

    #[test]
    fn test_get_falls_back_to_upper_case() {
        let raw = record(json!({ "UFCRM87_1": "upper" }));
        assert_eq!(raw.get_str("ufCrm87_1").as_deref(), Some("upper"));
    }

    #[test]
    fn test_null_value_falls_through() {
        let raw = record(json!({ "ufCrm87_1": null, "UFCRM87_1": "upper" }));
        assert_eq!(raw.get_str("ufCrm87_1").as_deref(), Some("upper"));
        assert!(record(json!({ "a": null })).get("a").is_none());
    }

    #[test]
    fn test_numeric_values_stringify() {
        let raw = record(json!({ "id": 42, "hours": 2.5 }));
        assert_eq!(raw.id(), "42");
        assert_eq!(raw.get_str("hours").as_deref(), Some("2.5"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(RawRecord::from_value(json!([1, 2])).is_none());
        assert_eq!(RawRecord::default().id(), "?");
    }
}
