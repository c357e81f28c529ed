//! Serialization map loading
//!
//! The map is a JSON object: category -> raw label -> `[canonical_field, type]`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use tokio::fs;
use tracing::info;

use crate::domain::schema::SchemaRegistry;

/// Read the serialization map once; the registry is immutable afterwards
pub async fn load_schema_registry(path: &Path) -> Result<SchemaRegistry> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read serialization map {path:?}"))?;

    let registry: SchemaRegistry = serde_json::from_str(&content)
        .with_context(|| format!("Invalid serialization map {path:?}"))?;

    if let Err(collisions) = registry.check_reserved_fields() {
        let details: Vec<String> = collisions.iter().map(ToString::to_string).collect();
        bail!(
            "Invalid serialization map {path:?}: {}",
            details.join("; ")
        );
    }

    info!(
        "📋 Loaded serialization map for {} categories from {:?}",
        registry.category_count(),
        path
    );
    Ok(registry)
}
