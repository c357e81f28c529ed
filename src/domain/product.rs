//! Product types flowing from listing pages to the output sink

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::normalize::normalize_product_name;

/// A listing row that resolved to a detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub display_name: String,
    pub normalized_name: String,
    pub detail_url: String,
}

impl ProductRef {
    /// Returns `None` for rows that cannot enter the worker pool:
    /// an empty detail URL or a name that normalizes to nothing.
    pub fn new(display_name: &str, detail_url: &str) -> Option<Self> {
        let detail_url = detail_url.trim();
        if detail_url.is_empty() {
            return None;
        }
        let normalized_name = normalize_product_name(display_name)?;
        Some(Self {
            display_name: display_name.trim().to_string(),
            normalized_name,
            detail_url: detail_url.to_string(),
        })
    }
}

/// Raw value under one labeled spec block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecValue {
    Text(String),
    List(Vec<String>),
    Missing,
}

impl SpecValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGroup {
    pub label: String,
    pub value: SpecValue,
}

impl SpecGroup {
    pub fn new(label: impl Into<String>, value: SpecValue) -> Self {
        Self {
            label: label.into(),
            value,
        }
    }
}

/// Typed value stored under a canonical field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    Number(f64),
    Bool(bool),
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Integral floats collapse to `Integer` so "16" is not written as "16.0"
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            Self::Integer(value as i64)
        } else {
            Self::Number(value)
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(text) => Value::String(text.clone()),
            Self::Integer(n) => Value::Number((*n).into()),
            Self::Number(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Bool(b) => Value::Bool(*b),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    /// Flat cell text for tabular output; null is an empty cell
    pub fn to_cell(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Text(text) => text.clone(),
            Self::Integer(n) => n.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(Self::to_cell)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

/// Column names of the base fields, in output order
pub const BASE_COLUMNS: [&str; 5] = [
    "name",
    "pack_count",
    "user_rating_count",
    "user_rating_avg",
    "price",
];

/// JSON-only column carrying the detail page URL
pub const URL_COLUMN: &str = "url";

/// True for names owned by the record's base fields; dynamic fields must not use them
pub fn is_reserved_column(name: &str) -> bool {
    name == URL_COLUMN || BASE_COLUMNS.contains(&name)
}

/// One normalized product, built by a worker and immutable afterwards
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub normalized_name: String,
    pub detail_url: String,
    pub pack_count: Option<i64>,
    pub user_rating_count: Option<i64>,
    pub user_rating_avg: Option<f64>,
    pub price: Option<String>,
    fields: Vec<(String, FieldValue)>,
}

impl ProductRecord {
    pub fn new(normalized_name: impl Into<String>, detail_url: impl Into<String>) -> Self {
        Self {
            normalized_name: normalized_name.into(),
            detail_url: detail_url.into(),
            pack_count: None,
            user_rating_count: None,
            user_rating_avg: None,
            price: None,
            fields: Vec::new(),
        }
    }

    /// Insert or replace a dynamic field, keeping first-insertion order
    pub fn set_field(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(key, _)| *key == name) {
            slot.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Value for any column, base or dynamic
    pub fn column(&self, column: &str) -> FieldValue {
        match column {
            "name" => FieldValue::Text(self.normalized_name.clone()),
            "pack_count" => self.pack_count.map_or(FieldValue::Null, FieldValue::Integer),
            "user_rating_count" => self
                .user_rating_count
                .map_or(FieldValue::Null, FieldValue::Integer),
            "user_rating_avg" => self.user_rating_avg.map_or(FieldValue::Null, FieldValue::Number),
            "price" => self.price.clone().into(),
            other => self.field(other).cloned().unwrap_or(FieldValue::Null),
        }
    }

    /// Base columns, `url`, then this record's own fields in insertion order
    pub fn to_json(&self) -> Value {
        let columns: Vec<&str> = self.fields().map(|(key, _)| key).collect();
        self.to_json_columns(&columns)
    }

    /// Base columns, `url`, then `columns` in the given order; absent fields are null
    pub fn to_json_columns<S: AsRef<str>>(&self, columns: &[S]) -> Value {
        let mut object = Map::new();
        for column in BASE_COLUMNS {
            object.insert(column.to_string(), self.column(column).to_json());
        }
        object.insert(URL_COLUMN.to_string(), Value::String(self.detail_url.clone()));
        for column in columns.iter().map(AsRef::as_ref) {
            if !is_reserved_column(column) {
                object.insert(column.to_string(), self.column(column).to_json());
            }
        }
        Value::Object(object)
    }
}

/// Records gathered for one category, in crawl order
#[derive(Debug, Clone, Default)]
pub struct CategoryResult {
    records: Vec<ProductRecord>,
}

impl CategoryResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ProductRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Base columns, then every dynamic field in first-seen order
    pub fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = BASE_COLUMNS.iter().map(ToString::to_string).collect();
        for record in &self.records {
            for (key, _) in record.fields() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        columns
    }
}
