//! Detail page worker: one session per product, always closed

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::schema_mapper::SchemaMapper;
use super::spec_extractor::SpecExtractor;
use super::worker_pool::ProductWorker;
use crate::domain::category::Category;
use crate::domain::errors::CrawlResult;
use crate::domain::normalize::parse_pack_count;
use crate::domain::product::{ProductRecord, ProductRef};
use crate::domain::services::{PageSession, ReadyWait, RenderingSurface};

pub struct DetailPageWorker {
    surface: Arc<dyn RenderingSurface>,
    extractor: SpecExtractor,
    mapper: Arc<SchemaMapper>,
    category: Category,
    ready_selector: String,
    ready: ReadyWait,
}

impl DetailPageWorker {
    pub fn new(
        surface: Arc<dyn RenderingSurface>,
        extractor: SpecExtractor,
        mapper: Arc<SchemaMapper>,
        category: Category,
        ready_selector: impl Into<String>,
        ready: ReadyWait,
    ) -> Self {
        Self {
            surface,
            extractor,
            mapper,
            category,
            ready_selector: ready_selector.into(),
            ready,
        }
    }

    async fn visit(
        &self,
        session: &mut dyn PageSession,
        product: &ProductRef,
    ) -> CrawlResult<ProductRecord> {
        session.navigate(&product.detail_url).await?;
        session
            .wait_for_selector(&self.ready_selector, self.ready)
            .await?;

        let detail = self.extractor.extract(session).await?;

        let mut record = ProductRecord::new(&product.normalized_name, &product.detail_url);
        record.pack_count = parse_pack_count(&product.normalized_name);
        record.user_rating_count = detail.rating.num_ratings;
        record.user_rating_avg = detail.rating.avg_rating;
        record.price = detail.price;

        for group in &detail.spec_groups {
            let (field, value) = self.mapper.map(&self.category, &group.label, &group.value)?;
            record.set_field(field, value);
        }

        debug!(
            "✅ {} ({} fields)",
            record.normalized_name,
            record.fields().count()
        );
        Ok(record)
    }
}

#[async_trait]
impl ProductWorker for DetailPageWorker {
    type Output = ProductRecord;

    async fn run(&self, product: ProductRef) -> CrawlResult<ProductRecord> {
        let mut session = self.surface.open_session().await?;
        let outcome = self.visit(session.as_mut(), &product).await;
        session.close().await;
        outcome
    }
}
