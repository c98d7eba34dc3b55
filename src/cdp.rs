//! Chrome DevTools Protocol renderer backend (uses the `headless_chrome` crate)
//!
//! Launches a headless Chrome instance sized to the capture viewport,
//! navigates to the presentation document, and captures the card bitmap via
//! `Page.captureScreenshot`.

use std::sync::Arc;
use std::time::Duration;

use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};

use crate::renderer::{BackendFactory, RenderBackend};
use crate::{BitmapFormat, CaptureParams, Error, Result, ServiceConfig, Viewport};

/// CDP-based rendering backend.
pub struct CdpBackend {
    browser: Browser,
    tab: Arc<Tab>,
}

impl CdpBackend {
    /// Launch headless Chrome and open the tab used for every capture.
    pub fn new(viewport: Viewport, user_agent: &str, timeout_ms: u64) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport.width, viewport.height)))
            .build()
            .map_err(|e| Error::Init(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::Init(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::Init(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(timeout_ms));
        tab.set_user_agent(user_agent, None, None)
            .map_err(|e| Error::Init(format!("Failed to set user agent: {}", e)))?;

        Ok(Self { browser, tab })
    }
}

impl RenderBackend for CdpBackend {
    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tab
            .navigate_to(url)
            .map_err(|e| Error::RenderFailure(format!("Navigation failed: {}", e)))?;

        self.tab
            .wait_until_navigated()
            .map_err(|e| Error::RenderFailure(format!("Wait for navigation failed: {}", e)))?;

        // Let late-loading card assets settle
        std::thread::sleep(Duration::from_millis(500));

        Ok(())
    }

    fn capture(&mut self, params: &CaptureParams) -> Result<Vec<u8>> {
        let format = match params.format {
            BitmapFormat::Webp => Page::CaptureScreenshotFormatOption::Webp,
            BitmapFormat::Jpeg => Page::CaptureScreenshotFormatOption::Jpeg,
            BitmapFormat::Png => Page::CaptureScreenshotFormatOption::Png,
        };

        // PNG is lossless; the protocol rejects a quality there
        let quality = match params.format {
            BitmapFormat::Png => None,
            _ => Some(params.quality as u32),
        };

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: params.viewport.width as f64,
            height: params.viewport.height as f64,
            scale: 1.0,
        };

        self.tab
            .capture_screenshot(format, quality, Some(clip), true)
            .map_err(|e| Error::RenderFailure(format!("Screenshot failed: {}", e)))
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Drop tab and browser explicitly so the child process terminates
        // promptly.
        drop(self.tab);
        drop(self.browser);
        Ok(())
    }
}

/// Factory handed to the renderer pool; captures the config knobs the
/// backend needs.
pub fn backend_factory(config: &ServiceConfig) -> BackendFactory {
    let viewport = config.capture.viewport;
    let user_agent = config.user_agent.clone();
    let timeout_ms = config.render_timeout_ms;

    Arc::new(move || {
        Ok(Box::new(CdpBackend::new(viewport, &user_agent, timeout_ms)?)
            as Box<dyn RenderBackend>)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdp_backend_creation() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let result = CdpBackend::new(Viewport::default(), "wikicard-test", 5_000);
        if let Err(e) = result {
            eprintln!(
                "Skipping CDP backend creation test because Chrome is not available or failed to launch: {}",
                e
            );
        }
    }
}
