//! Output port for finished categories

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::category::Category;
use crate::domain::product::CategoryResult;

/// Receives one category's records once pagination is exhausted
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Persist `result` and return where it went
    async fn write_category(&self, category: &Category, result: &CategoryResult) -> Result<PathBuf>;
}
