// kintonesync/src/record/mod.rs
pub(crate) mod coercion;
pub(crate) mod mapper;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

pub use coercion::CoercionRules;
pub use mapper::build_record;

/// Source column holding the business identifier of every row.
pub const BUSINESS_ID_COLUMN: &str = "Id";

/// One result row from the source query, keyed by column name.
/// SQL NULL is kept as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRow {
    columns: HashMap<String, Option<String>>,
}

impl SourceRow {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(mut self, column: impl Into<String>, value: Option<&str>) -> Self {
        self.insert(column, value.map(str::to_string));
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: Option<String>) {
        self.columns.insert(column.into(), value);
    }

    /// Value of `column`; absent columns and NULL both read as `None`.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns.get(column).and_then(|v| v.as_deref())
    }

    pub fn business_id(&self) -> Option<&str> {
        self.get(BUSINESS_ID_COLUMN)
    }
}

/// Kintone's `{ "value": ... }` wrapper. A null value is serialized as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldValue {
    pub value: Option<String>,
}

impl FieldValue {
    pub fn new(value: Option<String>) -> Self {
        Self { value }
    }
}

/// Destination field name to value, serialized as the Kintone `record` object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DestinationRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl DestinationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.fields.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Copy of this record without `field`.
    pub fn without(&self, field: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(field);
        Self { fields }
    }
}
