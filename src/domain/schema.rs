//! Per-category serialization map: raw spec label -> canonical field + type

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::category::Category;
use super::errors::SchemaError;
use super::product::is_reserved_column;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationType {
    String,
    Number,
    #[serde(alias = "categorical")]
    Enum,
    Boolean,
    Dimension,
    Custom,
}

/// Canonical mapping for one raw label.
///
/// Serialized as a two-element array, `["core_count", "number"]`, matching the
/// shape of the serialization map files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, SerializationType)", into = "(String, SerializationType)")]
pub struct SchemaEntry {
    pub canonical_field: String,
    pub serialization_type: SerializationType,
}

impl SchemaEntry {
    pub fn new(canonical_field: impl Into<String>, serialization_type: SerializationType) -> Self {
        Self {
            canonical_field: canonical_field.into(),
            serialization_type,
        }
    }
}

impl From<(String, SerializationType)> for SchemaEntry {
    fn from((canonical_field, serialization_type): (String, SerializationType)) -> Self {
        Self {
            canonical_field,
            serialization_type,
        }
    }
}

impl From<SchemaEntry> for (String, SerializationType) {
    fn from(entry: SchemaEntry) -> Self {
        (entry.canonical_field, entry.serialization_type)
    }
}

/// What to do with a spec label the category schema does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// Unknown labels halt the category
    #[default]
    Strict,
    /// Unknown labels pass through verbatim
    Lenient,
}

pub type CategorySchema = HashMap<String, SchemaEntry>;

/// Process-wide, read-only schema configuration keyed by category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    categories: HashMap<String, CategorySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, category_key: impl Into<String>, label: impl Into<String>, entry: SchemaEntry) {
        self.categories
            .entry(category_key.into())
            .or_default()
            .insert(label.into(), entry);
    }

    /// Schema for a category, looked up by slug first and then by name
    pub fn for_category(&self, category: &Category) -> Option<&CategorySchema> {
        self.categories
            .get(category.slug())
            .or_else(|| self.categories.get(&category.name))
    }

    /// Reject entries whose canonical field would shadow a base column.
    ///
    /// Reports every collision, ordered by category and label.
    pub fn check_reserved_fields(&self) -> Result<(), Vec<SchemaError>> {
        let mut collisions: Vec<(&str, &str, &str)> = self
            .categories
            .iter()
            .flat_map(|(category, schema)| {
                schema
                    .iter()
                    .filter(|(_, entry)| is_reserved_column(&entry.canonical_field))
                    .map(move |(label, entry)| {
                        (category.as_str(), label.as_str(), entry.canonical_field.as_str())
                    })
            })
            .collect();

        if collisions.is_empty() {
            return Ok(());
        }
        collisions.sort_unstable();
        Err(collisions
            .into_iter()
            .map(|(category, label, field)| SchemaError::reserved_field(category, label, field))
            .collect())
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
