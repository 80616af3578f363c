//! Record and search primitives.
//!
//! Records are schemaless field maps: the dispatcher never interprets their
//! contents, it only moves them between the store and handlers.

use indexmap::IndexMap;
use serde_json::Value;
use smol_str::SmolStr;

/// Field name to value map for one record.
pub type FieldMap = IndexMap<String, Value>;

/// A record loaded from the store.
///
/// A record is only valid inside the transaction that loaded it; plain
/// values must be extracted before the transaction closes.
#[derive(Debug, Clone)]
pub struct Record {
    /// The record id.
    pub id: i64,
    /// The model name (e.g. "website", "sale.order").
    pub model: SmolStr,
    fields: FieldMap,
}

impl Record {
    /// Create a record from raw parts.
    pub fn new(model: impl Into<SmolStr>, id: i64, fields: FieldMap) -> Self {
        Self {
            id,
            model: model.into(),
            fields,
        }
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as a string slice.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Get a field as an i64.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    /// All fields.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Consume into the field map.
    pub fn into_fields(self) -> FieldMap {
        self.fields
    }
}

/// Equality search criteria.
///
/// ```rust
/// use portico_store::Criteria;
/// use serde_json::json;
///
/// let criteria = Criteria::new().eq("name", json!("shop.example"));
/// assert_eq!(criteria.terms().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    terms: Vec<(String, Value)>,
}

impl Criteria {
    /// Create empty criteria (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality term.
    pub fn eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.terms.push((field.into(), value));
        self
    }

    /// The equality terms.
    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    /// Check a field map against every term.
    pub fn matches(&self, fields: &FieldMap) -> bool {
        self.terms
            .iter()
            .all(|(field, value)| fields.get(field) == Some(value))
    }
}
