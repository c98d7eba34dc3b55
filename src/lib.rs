//! Wikicard
//!
//! A social-card image pipeline for wiki articles: resolve article metadata
//! from a MediaWiki-style API, select a representative image, render the
//! article's presentation document in a headless browser, and cache the
//! captured bitmap keyed by page id.
//!
//! # Features
//!
//! - **CDP Backend** (default): captures bitmaps via headless Chrome
//! - **Pluggable Renderer**: the `RenderBackend` trait keeps the rendering
//!   engine swappable (tests run against an in-process mock)
//! - **One Renderer Pool**: queued and on-demand renders share a single
//!   capacity-bounded pool
//!
//! # Example
//!
//! ```no_run
//! use wikicard::{cdp, CardService, ServiceConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::default();
//! let factory = cdp::backend_factory(&config);
//! let service = CardService::new(config, factory)?;
//!
//! // Queue a render and watch its outcome
//! let handle = service.submit_render(4242, "Some_Article", false);
//! println!("outcome: {:?}", handle.outcome().await?);
//!
//! // Or render inline and get the bytes back
//! let card = service.get_rendered_image(4242, "Some_Article", false).await?;
//! println!("{} bytes ({})", card.bytes.len(), card.content_type);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

// Upstream wiki API client (content, image info, category listing)
pub mod api;

// Article metadata resolution
pub mod metadata;

// Canonical image selection
pub mod image;

// Filesystem bitmap cache
pub mod cache;

// Renderer seam: backend trait + async worker-thread handle
pub mod renderer;

// Semaphore-bounded renderer pool shared by both render paths
pub mod pool;

// Render queue (async worker pool) and the inline render path
pub mod queue;

// Paginated category batch submission
pub mod batch;

// Service façade tying the pipeline together
pub mod service;

// CDP renderer backend (headless Chrome)
#[cfg(feature = "cdp")]
pub mod cdp;

pub use cache::CardCache;
pub use metadata::PageMetadata;
pub use queue::{RenderQueue, TaskHandle, TaskOutcome, TaskStatus};
pub use renderer::{BackendFactory, RenderBackend, Renderer};
pub use service::{CardService, RenderedImage};

/// Configuration for the card pipeline
///
/// The defaults reproduce the production deployment this crate was written
/// for: a throttled `api.php` client, a 1632×854 WebP capture, and a single
/// render worker. Every knob can be overridden before handing the config to
/// [`CardService::new`].
///
/// # Examples
///
/// ```
/// let cfg = wikicard::ServiceConfig::default();
/// assert_eq!(cfg.workers, 1);
/// assert_eq!(cfg.capture.viewport.width, 1632);
/// ```
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the wiki exposing `api.php`
    pub api_base: String,
    /// User agent sent with every upstream request
    pub user_agent: String,
    /// Timeout for upstream API requests in milliseconds
    pub api_timeout_ms: u64,
    /// Minimum spacing between outbound API requests in milliseconds,
    /// shared across every caller in the process
    pub throttle_ms: u64,
    /// Timeout for each renderer operation (navigate, capture) in milliseconds
    pub render_timeout_ms: u64,
    /// URL template of the presentation document the renderer navigates to;
    /// `%pageid%` and `%title%` are substituted per render
    pub view_template: String,
    /// Directory holding the rendered bitmaps
    pub cache_dir: PathBuf,
    /// Image URL used when no embedded image qualifies
    pub default_image_url: String,
    /// Image title fragment that must never represent an article
    pub sentinel_image: String,
    /// Category marking Tamil-language articles
    pub tamil_category: String,
    /// Category marking English-language articles
    pub english_category: String,
    /// Category marking finalized articles; also the default batch listing
    pub finalized_category: String,
    /// Number of render workers; also the renderer pool capacity
    pub workers: usize,
    /// Fixed output parameters for every capture
    pub capture: CaptureParams,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base: "https://tamil.wiki/".to_string(),
            user_agent: "wikicard/0.1".to_string(),
            api_timeout_ms: 15_000,
            throttle_ms: 500,
            render_timeout_ms: 30_000,
            view_template: "http://localhost:3000/view/%pageid%-%title%".to_string(),
            cache_dir: PathBuf::from("out"),
            default_image_url:
                "https://pbs.twimg.com/profile_images/1522722512400183299/SkcVay7z_400x400.jpg"
                    .to_string(),
            sentinel_image: "Finalised.jpg".to_string(),
            tamil_category: "Category:Tamil Content".to_string(),
            english_category: "Category:English Content".to_string(),
            finalized_category: "Category:Finalised".to_string(),
            workers: 1,
            capture: CaptureParams::default(),
        }
    }
}

impl ServiceConfig {
    /// Build the URL of the presentation document for one article.
    ///
    /// `encoded_title` must already be in URL form (see
    /// [`PageMetadata::encoded_title`]).
    pub fn view_target(&self, page_id: u64, encoded_title: &str) -> String {
        self.view_template
            .replace("%pageid%", &page_id.to_string())
            .replace("%title%", encoded_title)
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1632,
            height: 854,
        }
    }
}

/// Bitmap encoding of the captured card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitmapFormat {
    Webp,
    Jpeg,
    Png,
}

impl BitmapFormat {
    /// MIME type of the encoding
    pub fn content_type(&self) -> &'static str {
        match self {
            BitmapFormat::Webp => "image/webp",
            BitmapFormat::Jpeg => "image/jpeg",
            BitmapFormat::Png => "image/png",
        }
    }

    /// File extension used for cache entries
    pub fn extension(&self) -> &'static str {
        match self {
            BitmapFormat::Webp => "webp",
            BitmapFormat::Jpeg => "jpeg",
            BitmapFormat::Png => "png",
        }
    }
}

/// Fixed output parameters applied to every capture
#[derive(Debug, Clone, Copy)]
pub struct CaptureParams {
    /// Capture clip, also the renderer window size
    pub viewport: Viewport,
    /// Bitmap encoding
    pub format: BitmapFormat,
    /// Encoder quality (ignored for PNG)
    pub quality: u8,
}

impl Default for CaptureParams {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            format: BitmapFormat::Webp,
            quality: 80,
        }
    }
}
