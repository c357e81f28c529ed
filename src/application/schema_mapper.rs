//! Raw spec label -> canonical field and typed value
//!
//! Strict categories reject unknown labels with `SchemaError::Violation`.
//! Lenient categories, and categories without any schema, keep the raw label
//! and a dimension-normalized text value.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::domain::category::Category;
use crate::domain::errors::{CrawlResult, SchemaError};
use crate::domain::normalize::{normalize_dimension, parse_number};
use crate::domain::product::{FieldValue, SpecValue, is_reserved_column};
use crate::domain::schema::{SchemaEntry, SchemaPolicy, SchemaRegistry, SerializationType};

/// Prefix for lenient labels that collide with a base column
pub const LENIENT_PREFIX: &str = "spec_";

/// Converter for `custom` fields; never called for missing values
pub type Converter = Arc<dyn Fn(&SpecValue) -> FieldValue + Send + Sync>;

static UNIT_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(-?[\d.,]+)\s*([a-z]+)").expect("valid unit quantity regex")
});

/// Apply `convert` to a text value, or to every item of a list
fn per_item(raw: &SpecValue, convert: impl Fn(&str) -> FieldValue) -> FieldValue {
    match raw {
        SpecValue::Text(text) => convert(text),
        SpecValue::List(items) => FieldValue::List(items.iter().map(|item| convert(item)).collect()),
        SpecValue::Missing => FieldValue::Null,
    }
}

fn number_or_null(text: &str) -> FieldValue {
    parse_number(text).map_or(FieldValue::Null, FieldValue::from_f64)
}

fn text_or_null(text: &str) -> FieldValue {
    let text = text.trim();
    if text.is_empty() {
        FieldValue::Null
    } else {
        FieldValue::Text(text.to_string())
    }
}

fn boolean_or_null(text: &str) -> FieldValue {
    match text.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "y" => FieldValue::Bool(true),
        "no" | "false" | "n" => FieldValue::Bool(false),
        _ => FieldValue::Null,
    }
}

fn dimension_or_null(text: &str) -> FieldValue {
    match normalize_dimension(text) {
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map_or(FieldValue::Text(value), FieldValue::from_f64),
        None => FieldValue::Null,
    }
}

/// Value with unit scaled into the target unit, e.g. "800 MHz" -> 0.8 (GHz).
///
/// `scale` maps a lowercase unit to a `(multiplier, divisor)` pair.
fn scaled_quantity(text: &str, scale: impl Fn(&str) -> Option<(f64, f64)>) -> FieldValue {
    let Some(captures) = UNIT_QUANTITY.captures(text) else {
        return number_or_null(text);
    };
    let amount = captures.get(1).and_then(|m| parse_number(m.as_str()));
    let factor = captures.get(2).and_then(|m| scale(&m.as_str().to_ascii_lowercase()));
    match (amount, factor) {
        (Some(amount), Some((multiplier, divisor))) => {
            FieldValue::from_f64(amount * multiplier / divisor)
        }
        _ => FieldValue::Null,
    }
}

pub mod converters {
    //! Built-in `custom` converters

    use super::{FieldValue, SpecValue, boolean_or_null, per_item, scaled_quantity};

    /// "3.7 GHz" -> 3.7, "800 MHz" -> 0.8
    pub fn clock_speed_ghz(raw: &SpecValue) -> FieldValue {
        per_item(raw, |text| {
            scaled_quantity(text, |unit| match unit {
                "ghz" => Some((1.0, 1.0)),
                "mhz" => Some((1.0, 1000.0)),
                _ => None,
            })
        })
    }

    /// "AM4, AM5" or one socket per line -> list of sockets
    pub fn socket_list(raw: &SpecValue) -> FieldValue {
        let split = |text: &str| -> Vec<FieldValue> {
            text.split([',', '\n'])
                .map(str::trim)
                .filter(|socket| !socket.is_empty())
                .map(|socket| FieldValue::Text(socket.to_string()))
                .collect()
        };
        match raw {
            SpecValue::Text(text) => FieldValue::List(split(text)),
            SpecValue::List(items) => FieldValue::List(items.iter().flat_map(|item| split(item)).collect()),
            SpecValue::Missing => FieldValue::Null,
        }
    }

    /// "2 TB" -> 2000, "512 GB" -> 512, "256 MB" -> 0.256
    pub fn capacity_gb(raw: &SpecValue) -> FieldValue {
        per_item(raw, |text| {
            scaled_quantity(text, |unit| match unit {
                "tb" => Some((1000.0, 1.0)),
                "gb" => Some((1.0, 1.0)),
                "mb" => Some((1.0, 1000.0)),
                _ => None,
            })
        })
    }

    pub fn yes_no(raw: &SpecValue) -> FieldValue {
        per_item(raw, boolean_or_null)
    }
}

/// Named converters and their `(category, field)` bindings
#[derive(Clone, Default)]
pub struct ConverterRegistry {
    named: HashMap<String, Converter>,
    bindings: HashMap<(String, String), Converter>,
}

impl std::fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry knowing every built-in converter by name
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("clock_speed_ghz", converters::clock_speed_ghz);
        registry.register("socket_list", converters::socket_list);
        registry.register("capacity_gb", converters::capacity_gb);
        registry.register("yes_no", converters::yes_no);
        registry
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        converter: impl Fn(&SpecValue) -> FieldValue + Send + Sync + 'static,
    ) {
        self.named.insert(name.into(), Arc::new(converter));
    }

    /// Bind a named converter to a category's canonical field
    pub fn bind(&mut self, category_key: &str, field: &str, converter_name: &str) -> Result<()> {
        let converter = self
            .named
            .get(converter_name)
            .ok_or_else(|| anyhow!("Unknown converter '{converter_name}'"))?;
        self.bindings.insert(
            (category_key.to_string(), field.to_string()),
            Arc::clone(converter),
        );
        Ok(())
    }

    /// Bind every `category -> field -> converter` entry of a configuration table
    pub fn bind_all(&mut self, table: &HashMap<String, HashMap<String, String>>) -> Result<()> {
        for (category_key, fields) in table {
            for (field, converter_name) in fields {
                self.bind(category_key, field, converter_name)?;
            }
        }
        Ok(())
    }

    /// Converter bound for a category's field, looked up by slug then name
    pub fn lookup(&self, category: &Category, field: &str) -> Option<&Converter> {
        let by = |key: &str| self.bindings.get(&(key.to_string(), field.to_string()));
        by(category.slug()).or_else(|| by(&category.name))
    }
}

pub struct SchemaMapper {
    registry: Arc<SchemaRegistry>,
    converters: Arc<ConverterRegistry>,
    policy: SchemaPolicy,
}

impl SchemaMapper {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        converters: Arc<ConverterRegistry>,
        policy: SchemaPolicy,
    ) -> Self {
        Self {
            registry,
            converters,
            policy,
        }
    }

    /// Policy in force for `category`; without a schema nothing can be strict
    pub fn policy_for(&self, category: &Category) -> SchemaPolicy {
        if self.registry.for_category(category).is_some() {
            self.policy
        } else {
            SchemaPolicy::Lenient
        }
    }

    /// Map one spec group to its output field
    pub fn map(
        &self,
        category: &Category,
        label: &str,
        raw: &SpecValue,
    ) -> CrawlResult<(String, FieldValue)> {
        let entry = self
            .registry
            .for_category(category)
            .and_then(|schema| schema.get(label));

        match (entry, self.policy_for(category)) {
            (Some(entry), _) if is_reserved_column(&entry.canonical_field) => Err(
                SchemaError::reserved_field(category.slug(), label, &entry.canonical_field).into(),
            ),
            (Some(entry), _) => self.convert(category, entry, raw),
            (None, SchemaPolicy::Strict) => {
                Err(SchemaError::violation(category.slug(), label).into())
            }
            (None, SchemaPolicy::Lenient) => {
                debug!("Unmapped spec '{}' kept verbatim for '{}'", label, category.name);
                Ok((lenient_field_name(label), lenient_value(raw)))
            }
        }
    }

    fn convert(
        &self,
        category: &Category,
        entry: &SchemaEntry,
        raw: &SpecValue,
    ) -> CrawlResult<(String, FieldValue)> {
        let field = entry.canonical_field.clone();
        if raw.is_missing() {
            return Ok((field, FieldValue::Null));
        }

        let value = match entry.serialization_type {
            SerializationType::String => match raw {
                SpecValue::List(items) => text_or_null(
                    &items
                        .iter()
                        .map(|item| item.trim())
                        .filter(|item| !item.is_empty())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
                other => per_item(other, text_or_null),
            },
            SerializationType::Number => per_item(raw, number_or_null),
            SerializationType::Enum => per_item(raw, text_or_null),
            SerializationType::Boolean => per_item(raw, boolean_or_null),
            SerializationType::Dimension => per_item(raw, dimension_or_null),
            SerializationType::Custom => {
                let converter = self.converters.lookup(category, &field).ok_or_else(|| {
                    SchemaError::MissingConverter {
                        category: category.slug().to_string(),
                        field: field.clone(),
                    }
                })?;
                converter(raw)
            }
        };
        Ok((field, value))
    }
}

/// Raw labels that would shadow a base column get a `spec_` prefix
fn lenient_field_name(label: &str) -> String {
    if is_reserved_column(label) {
        format!("{LENIENT_PREFIX}{label}")
    } else {
        label.to_string()
    }
}

/// Raw label passthrough: dimension-normalized text, list items joined
fn lenient_value(raw: &SpecValue) -> FieldValue {
    match raw {
        SpecValue::Text(text) => normalize_dimension(text).into(),
        SpecValue::List(items) => {
            let joined = items
                .iter()
                .filter_map(|item| normalize_dimension(item))
                .collect::<Vec<_>>()
                .join(", ");
            if joined.is_empty() {
                FieldValue::Null
            } else {
                FieldValue::Text(joined)
            }
        }
        SpecValue::Missing => FieldValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::CrawlError;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cpu() -> Category {
        Category::new("CPUs", "/products/cpu/")
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        for (label, field, kind) in [
            ("Core Count", "core_count", SerializationType::Number),
            ("Socket", "socket", SerializationType::Custom),
            ("Series", "series", SerializationType::String),
            ("Microarchitecture", "microarchitecture", SerializationType::Enum),
            ("Includes Cooler", "includes_cooler", SerializationType::Boolean),
            ("Height", "height", SerializationType::Dimension),
            ("Performance Core Clock", "core_clock", SerializationType::Custom),
        ] {
            registry.insert("cpu", label, SchemaEntry::new(field, kind));
        }
        registry
    }

    fn mapper(policy: SchemaPolicy) -> SchemaMapper {
        let mut converters = ConverterRegistry::with_builtins();
        converters.bind("cpu", "socket", "socket_list").unwrap();
        SchemaMapper::new(Arc::new(registry()), Arc::new(converters), policy)
    }

    fn text(value: &str) -> SpecValue {
        SpecValue::Text(value.to_string())
    }

    #[test]
    fn unknown_label_is_a_violation_in_strict_mode() {
        let err = mapper(SchemaPolicy::Strict)
            .map(&cpu(), "Unknown Spec", &text("x"))
            .unwrap_err();
        assert!(err.is_category_fatal());
        assert!(matches!(
            err,
            CrawlError::Schema(SchemaError::Violation { ref category, ref label })
                if category == "cpu" && label == "Unknown Spec"
        ));
    }

    #[test]
    fn unknown_label_passes_through_in_lenient_mode() {
        let (field, value) = mapper(SchemaPolicy::Lenient)
            .map(&cpu(), "Fan Size", &text("+ 120 mm"))
            .unwrap();
        assert_eq!(field, "Fan Size");
        assert_eq!(value, FieldValue::Text("120".into()));

        let (_, list) = mapper(SchemaPolicy::Lenient)
            .map(&cpu(), "Sizes", &SpecValue::List(vec!["92 mm".into(), "120 mm".into()]))
            .unwrap();
        assert_eq!(list, FieldValue::Text("92, 120".into()));
    }

    #[rstest]
    #[case("price", "spec_price")]
    #[case("name", "spec_name")]
    #[case("url", "spec_url")]
    #[case("Price", "Price")]
    fn lenient_labels_never_shadow_base_columns(#[case] label: &str, #[case] expected: &str) {
        let (field, value) = mapper(SchemaPolicy::Lenient)
            .map(&cpu(), label, &text("42"))
            .unwrap();
        assert_eq!(field, expected);
        assert_eq!(value, FieldValue::Text("42".into()));
    }

    #[test]
    fn entry_targeting_base_column_halts_category() {
        let mut registry = registry();
        registry.insert("cpu", "Model", SchemaEntry::new("name", SerializationType::String));
        let mapper = SchemaMapper::new(
            Arc::new(registry),
            Arc::new(ConverterRegistry::with_builtins()),
            SchemaPolicy::Lenient,
        );

        let err = mapper.map(&cpu(), "Model", &text("Ryzen 7")).unwrap_err();
        assert!(err.is_category_fatal());
        assert!(matches!(
            err,
            CrawlError::Schema(SchemaError::ReservedField { ref label, ref field, .. })
                if label == "Model" && field == "name"
        ));
    }

    #[test]
    fn categories_without_schema_are_lenient() {
        let mapper = mapper(SchemaPolicy::Strict);
        let memory = Category::new("Memory", "/products/memory/");
        assert_eq!(mapper.policy_for(&memory), SchemaPolicy::Lenient);
        assert_eq!(
            mapper.map(&memory, "Speed", &text("DDR5-6000")).unwrap(),
            ("Speed".to_string(), FieldValue::Text("DDR5-6000".into()))
        );
    }

    #[test]
    fn missing_value_skips_converter() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut converters = ConverterRegistry::new();
        converters.register("counting", move |_: &SpecValue| {
            counter.fetch_add(1, Ordering::SeqCst);
            FieldValue::Text("converted".into())
        });
        converters.bind("cpu", "core_clock", "counting").unwrap();
        let mapper = SchemaMapper::new(Arc::new(registry()), Arc::new(converters), SchemaPolicy::Strict);

        let mapped = mapper
            .map(&cpu(), "Performance Core Clock", &SpecValue::Missing)
            .unwrap();
        assert_eq!(mapped, ("core_clock".to_string(), FieldValue::Null));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        mapper.map(&cpu(), "Performance Core Clock", &text("4.2 GHz")).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unbound_custom_field_is_a_schema_error() {
        let err = mapper(SchemaPolicy::Lenient)
            .map(&cpu(), "Performance Core Clock", &text("4.2 GHz"))
            .unwrap_err();
        assert!(matches!(
            err,
            CrawlError::Schema(SchemaError::MissingConverter { ref field, .. }) if field == "core_clock"
        ));
    }

    #[rstest]
    #[case("Core Count", text("8"), FieldValue::Integer(8))]
    #[case("Core Count", text("n/a"), FieldValue::Null)]
    #[case(
        "Core Count",
        SpecValue::List(vec!["6".into(), "8".into()]),
        FieldValue::List(vec![FieldValue::Integer(6), FieldValue::Integer(8)])
    )]
    #[case("Series", text("  AMD Ryzen 7 "), FieldValue::Text("AMD Ryzen 7".into()))]
    #[case(
        "Series",
        SpecValue::List(vec!["Ryzen 7".into(), " ".into(), "Ryzen 9".into()]),
        FieldValue::Text("Ryzen 7, Ryzen 9".into())
    )]
    #[case("Microarchitecture", text("Zen 4"), FieldValue::Text("Zen 4".into()))]
    #[case("Includes Cooler", text("Yes"), FieldValue::Bool(true))]
    #[case("Includes Cooler", text("maybe"), FieldValue::Null)]
    #[case("Height", text("158 mm"), FieldValue::Integer(158))]
    #[case("Height", text("Low Profile"), FieldValue::Text("Low Profile".into()))]
    #[case(
        "Socket",
        text("AM4, AM5\nLGA1700"),
        FieldValue::List(vec![
            FieldValue::Text("AM4".into()),
            FieldValue::Text("AM5".into()),
            FieldValue::Text("LGA1700".into()),
        ])
    )]
    fn typed_conversion(#[case] label: &str, #[case] raw: SpecValue, #[case] expected: FieldValue) {
        let (_, value) = mapper(SchemaPolicy::Strict).map(&cpu(), label, &raw).unwrap();
        assert_eq!(value, expected);
    }

    #[rstest]
    #[case("3.7 GHz", FieldValue::Number(3.7))]
    #[case("800 MHz", FieldValue::Number(0.8))]
    #[case("4 GHz", FieldValue::Integer(4))]
    #[case("fast", FieldValue::Null)]
    fn clock_speed_converter(#[case] input: &str, #[case] expected: FieldValue) {
        assert_eq!(converters::clock_speed_ghz(&text(input)), expected);
    }

    #[rstest]
    #[case("2 TB", FieldValue::Integer(2000))]
    #[case("512 GB", FieldValue::Integer(512))]
    #[case("1,024GB", FieldValue::Integer(1024))]
    #[case("unknown", FieldValue::Null)]
    fn capacity_converter(#[case] input: &str, #[case] expected: FieldValue) {
        assert_eq!(converters::capacity_gb(&text(input)), expected);
    }

    #[test]
    fn binding_unknown_converter_fails() {
        let mut converters = ConverterRegistry::with_builtins();
        assert!(converters.bind("cpu", "socket", "no_such_converter").is_err());
    }
}
