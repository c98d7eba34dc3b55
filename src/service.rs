//! Service façade over the render pipeline.
//!
//! One `CardService` owns the throttled API client, the bitmap cache, and
//! the render queue, and exposes the operations an HTTP or CLI layer fronts:
//! queue a render, fan out a category batch, serve a card inline, or return
//! the raw document data the renderer presents.

use std::sync::Arc;

use log::info;
use time::Date;

use crate::api::WikiClient;
use crate::batch::{self, ListingRequest};
use crate::cache::CardCache;
use crate::metadata::{self, PageMetadata};
use crate::queue::{RenderQueue, TaskHandle, TaskStatus};
use crate::renderer::BackendFactory;
use crate::{Result, ServiceConfig};

/// A card ready to serve: bitmap bytes plus their MIME type.
#[derive(Debug)]
pub struct RenderedImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// The assembled pipeline.
pub struct CardService {
    config: Arc<ServiceConfig>,
    client: Arc<WikiClient>,
    cache: Arc<CardCache>,
    queue: RenderQueue,
}

impl CardService {
    /// Wire the pipeline together and spawn the render workers. Must be
    /// called within a Tokio runtime.
    pub fn new(config: ServiceConfig, factory: BackendFactory) -> Result<Self> {
        let config = Arc::new(config);
        let client = Arc::new(WikiClient::new(&config)?);
        let cache = Arc::new(CardCache::new(
            config.cache_dir.clone(),
            config.capture.format,
        ));
        let queue = RenderQueue::new(config.clone(), client.clone(), cache.clone(), factory);

        Ok(Self {
            config,
            client,
            cache,
            queue,
        })
    }

    /// Queue a render. Never blocks on render completion; await the handle's
    /// outcome only if you care.
    pub fn submit_render(&self, page_id: u64, title: &str, force: bool) -> TaskHandle {
        self.queue.submit(page_id, title, force)
    }

    /// Walk a category listing and queue a forced render for every item
    /// matching the date filter. Defaults to the finalized-articles category.
    ///
    /// Returns one handle per queued task; drop them for fire-and-forget
    /// semantics, or await their outcomes to watch the batch drain.
    pub async fn submit_category_batch(
        &self,
        category: Option<&str>,
        date_filter: Option<Date>,
    ) -> Result<Vec<TaskHandle>> {
        let category = category.unwrap_or(&self.config.finalized_category);
        let request = ListingRequest::new(category);

        let mut handles = Vec::new();
        batch::submit_paged(&self.client, request, date_filter, |page_id, title| {
            handles.push(self.queue.submit(page_id, title, true));
        })
        .await?;

        Ok(handles)
    }

    /// Serve a card: the cached bitmap on a hit (unless forced), otherwise a
    /// fresh inline render written through to the cache.
    pub async fn get_rendered_image(
        &self,
        page_id: u64,
        title: &str,
        force: bool,
    ) -> Result<RenderedImage> {
        let content_type = self.config.capture.format.content_type();

        if !force && self.cache.has(page_id) {
            info!("Serving cached card for page {} ({})", page_id, title);
            return Ok(RenderedImage {
                bytes: self.cache.get(page_id)?,
                content_type,
            });
        }

        let bytes = self.queue.render_now(page_id, title).await?;
        self.cache.put(page_id, &bytes)?;

        Ok(RenderedImage {
            bytes,
            content_type,
        })
    }

    /// The structured payload the presentation document is built from.
    /// Fails with [`crate::Error::PageNotFound`] for unknown titles.
    pub async fn get_render_document(&self, title: &str) -> Result<PageMetadata> {
        metadata::resolve_page(&self.client, &self.config, title).await
    }

    /// Last observed status of the most recent task for `page_id`.
    pub fn task_status(&self, page_id: u64) -> Option<TaskStatus> {
        self.queue.status(page_id)
    }

    /// The underlying bitmap store.
    pub fn cache(&self) -> &CardCache {
        &self.cache
    }
}
