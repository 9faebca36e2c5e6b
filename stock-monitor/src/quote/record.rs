//! Generic key/value quote record decoded from the vendor payload

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// Fields that must be present and non-null for a record to be displayable.
pub const REQUIRED_FIELDS: [&str; 13] = [
    "symbol",
    "current",
    "percent",
    "volume",
    "amount",
    "market_capital",
    "float_market_capital",
    "turnover_rate",
    "amplitude",
    "open",
    "last_close",
    "high",
    "low",
];

/// A single quote as returned by the vendor, keyed by canonical field name.
///
/// Values are kept as JSON scalars and rendered through `serde_json::Number`,
/// which drops trailing zeros (`85.10` shows as `85.1`). Typed accessors are
/// provided for the formatter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct QuoteRecord(Map<String, Value>);

impl QuoteRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Look up a field, treating JSON `null` as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn number(&self, key: &str) -> Option<&Number> {
        self.get(key).and_then(Value::as_number)
    }

    pub fn f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Symbol of the record, if the vendor supplied one as a string
    pub fn symbol(&self) -> Option<&str> {
        self.get("symbol").and_then(Value::as_str)
    }

    /// First required field that is missing or null
    pub fn missing_field(&self) -> Option<&'static str> {
        REQUIRED_FIELDS
            .iter()
            .copied()
            .find(|field| self.get(field).is_none())
    }

    pub fn is_valid(&self) -> bool {
        self.missing_field().is_none()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for QuoteRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}
