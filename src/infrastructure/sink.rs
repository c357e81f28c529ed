//! File sinks for finished categories and the record counter
//!
//! One file per category, named after the normalized category name with
//! path separators and other unsafe characters replaced.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::category::Category;
use crate::domain::product::CategoryResult;
use crate::domain::services::RecordSink;
use crate::infrastructure::config::OutputFormat;

/// Sink matching the configured output format
pub fn sink_for(format: OutputFormat, directory: impl Into<PathBuf>) -> Arc<dyn RecordSink> {
    let directory = directory.into();
    match format {
        OutputFormat::Csv => Arc::new(CsvSink::new(directory)),
        OutputFormat::Json => Arc::new(JsonSink::new(directory)),
    }
}

async fn output_path(directory: &Path, category: &Category, format: OutputFormat) -> Result<PathBuf> {
    fs::create_dir_all(directory)
        .await
        .with_context(|| format!("Failed to create output directory {directory:?}"))?;
    Ok(directory.join(format!("{}.{}", category.file_stem(), format.extension())))
}

/// Header = column union; missing values are empty cells
pub struct CsvSink {
    directory: PathBuf,
}

impl CsvSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn render(result: &CategoryResult) -> Result<Vec<u8>> {
        let columns = result.columns();
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&columns)?;
        for record in result.records() {
            writer.write_record(columns.iter().map(|column| record.column(column).to_cell()))?;
        }
        writer.into_inner().context("Failed to flush CSV buffer")
    }
}

#[async_trait]
impl RecordSink for CsvSink {
    async fn write_category(&self, category: &Category, result: &CategoryResult) -> Result<PathBuf> {
        let path = output_path(&self.directory, category, OutputFormat::Csv).await?;
        let bytes = Self::render(result)
            .with_context(|| format!("Failed to render CSV for category '{}'", category.name))?;
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?;

        info!("💾 Wrote {} records to {:?}", result.len(), path);
        Ok(path)
    }
}

/// JSON array of records; every column is present, missing ones as `null`
pub struct JsonSink {
    directory: PathBuf,
}

impl JsonSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn render(result: &CategoryResult) -> Result<String> {
        let columns = result.columns();
        let records: Vec<Value> = result
            .records()
            .iter()
            .map(|record| record.to_json_columns(&columns))
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

#[async_trait]
impl RecordSink for JsonSink {
    async fn write_category(&self, category: &Category, result: &CategoryResult) -> Result<PathBuf> {
        let path = output_path(&self.directory, category, OutputFormat::Json).await?;
        let content = Self::render(result)
            .with_context(|| format!("Failed to render JSON for category '{}'", category.name))?;
        fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write {path:?}"))?;

        info!("💾 Wrote {} records to {:?}", result.len(), path);
        Ok(path)
    }
}

/// Records found per output file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordCount {
    pub files: Vec<(String, usize)>,
    pub total: usize,
}

/// Count records in every `.json` and `.csv` output file of `directory`
pub async fn count_records(directory: &Path) -> Result<RecordCount> {
    let mut entries = fs::read_dir(directory)
        .await
        .with_context(|| format!("Failed to read output directory {directory:?}"))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(ToString::to_string) else {
            continue;
        };

        let count = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => count_json_records(&path).await?,
            Some("csv") => count_csv_records(&path).await?,
            _ => continue,
        };
        files.push((name, count));
    }

    files.sort();
    let total = files.iter().map(|(_, count)| count).sum();
    Ok(RecordCount { files, total })
}

async fn count_json_records(path: &Path) -> Result<usize> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {path:?}"))?;
    let value: Value =
        serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {path:?}"))?;
    match value {
        Value::Array(items) => Ok(items.len()),
        _ => {
            warn!("Skipping {:?}: not a JSON array", path);
            Ok(0)
        }
    }
}

async fn count_csv_records(path: &Path) -> Result<usize> {
    let content = fs::read(path)
        .await
        .with_context(|| format!("Failed to read {path:?}"))?;
    let mut reader = csv::Reader::from_reader(content.as_slice());
    let mut count = 0;
    for record in reader.records() {
        record.with_context(|| format!("Invalid CSV in {path:?}"))?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::{FieldValue, ProductRecord};

    fn sample() -> (Category, CategoryResult) {
        let mut first = ProductRecord::new("Widget, Large", "https://shop.test/p/1");
        first.price = Some("19.99".into());
        first.set_field("socket", FieldValue::List(vec![
            FieldValue::Text("AM4".into()),
            FieldValue::Text("AM5".into()),
        ]));
        let mut second = ProductRecord::new("Gadget", "https://shop.test/p/2");
        second.set_field("tdp", FieldValue::Integer(65));

        let mut result = CategoryResult::new();
        result.extend([first, second]);
        (Category::new("CPU Coolers", "/products/cpu-cooler/"), result)
    }

    #[tokio::test]
    async fn csv_sink_writes_union_columns() {
        let dir = tempfile::tempdir().unwrap();
        let (category, result) = sample();

        let path = CsvSink::new(dir.path())
            .write_category(&category, &result)
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), "cpu_coolers.csv");

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(
            lines[0],
            "name,pack_count,user_rating_count,user_rating_avg,price,socket,tdp"
        );
        assert_eq!(lines[1], "\"Widget, Large\",,,,19.99,\"AM4, AM5\",");
        assert_eq!(lines[2], "Gadget,,,,,,65");
    }

    #[tokio::test]
    async fn json_sink_fills_missing_columns_with_null() {
        let dir = tempfile::tempdir().unwrap();
        let (category, result) = sample();

        let path = JsonSink::new(dir.path().join("nested"))
            .write_category(&category, &result)
            .await
            .unwrap();

        let value: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        let records = value.as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["socket"], serde_json::json!(["AM4", "AM5"]));
        assert!(records[0]["tdp"].is_null());
        assert!(records[1]["socket"].is_null());
        assert_eq!(records[1]["url"], "https://shop.test/p/2");
    }

    #[tokio::test]
    async fn category_name_with_slash_writes_one_file() {
        let dir = tempfile::tempdir().unwrap();
        let (_, result) = sample();
        let category = Category::new("Headphones / Headsets", "/products/headphones/");

        let path = CsvSink::new(dir.path())
            .write_category(&category, &result)
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("headphones_headsets.csv"));
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 3);

        let count = count_records(dir.path()).await.unwrap();
        assert_eq!(count.files, vec![("headphones_headsets.csv".to_string(), 2)]);
    }

    #[tokio::test]
    async fn counter_sums_json_and_csv_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (category, result) = sample();
        JsonSink::new(dir.path()).write_category(&category, &result).await.unwrap();
        CsvSink::new(dir.path())
            .write_category(&Category::new("Memory", "/products/memory/"), &result)
            .await
            .unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let count = count_records(dir.path()).await.unwrap();
        assert_eq!(count.total, 4);
        assert_eq!(
            count.files,
            vec![("cpu_coolers.json".to_string(), 2), ("memory.csv".to_string(), 2)]
        );
    }
}
