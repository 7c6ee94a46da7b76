// The flat variable map the Entity Data Provider produces and the
// Template Renderer consumes (spec §4.2, §4.3).

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// A single resolved entity attribute. Numbers render without locale
/// formatting (spec §4.2); callers that need currency/locale formatting
/// must pre-format before inserting into the map.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

impl DataValue {
    /// Render this value the way it should appear when substituted into a
    /// template body.
    pub fn render(&self) -> String {
        match self {
            DataValue::Text(s) => s.clone(),
            DataValue::Number(n) => {
                if n.fract() == 0.0 {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            DataValue::Bool(b) => b.to_string(),
            DataValue::Timestamp(dt) => dt.to_rfc3339(),
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            DataValue::Timestamp(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl From<String> for DataValue {
    fn from(s: String) -> Self {
        DataValue::Text(s)
    }
}

impl From<&str> for DataValue {
    fn from(s: &str) -> Self {
        DataValue::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(dt: DateTime<Utc>) -> Self {
        DataValue::Timestamp(dt)
    }
}

/// Variables resolved for one `(tenant, entity_type, entity_id)`. A field
/// absent from the entity is omitted from the map entirely, never set to
/// an empty string — downstream code must be able to tell "missing" from
/// "empty" (spec §4.3).
pub type DataMap = HashMap<String, DataValue>;
