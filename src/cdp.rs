//! Chrome DevTools Protocol renderer (uses the `headless_chrome` crate)

use crate::{Error, RenderOptions, Renderer, RendererConfig, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

/// How long the DevTools connection may sit idle before Chrome is dropped.
/// A dead browser is detected by `is_connected` and relaunched on demand.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// Upper bound for a full-page capture, in CSS pixels
const MAX_PAGE_HEIGHT: u32 = 16_384;

/// Headless Chrome renderer
///
/// Launches one browser process with a single tab and reuses that tab for
/// every render. Documents are written into a blank page rather than loaded
/// from a URL, so no network access is needed for self-contained markup.
pub struct ChromeRenderer {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeRenderer {
    /// Launch a browser configured from `config`
    pub fn launch(config: &RendererConfig) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(config.sandbox)
            .path(config.chrome_path.clone())
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::InitializationError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::InitializationError(format!("Failed to create tab: {}", e)))?;

        tab.set_default_timeout(Duration::from_millis(config.timeout_ms));

        debug!("launched headless chrome ({}x{})", config.viewport.width, config.viewport.height);
        Ok(Self { browser, tab })
    }

    /// Replace the blank page's document with `html` and wait for web fonts.
    fn load_document(&self, html: &str) -> Result<()> {
        self.tab
            .navigate_to("about:blank")
            .map_err(|e| Error::RenderError(format!("Navigation failed: {}", e)))?
            .wait_until_navigated()
            .map_err(|e| Error::RenderError(format!("Wait for navigation failed: {}", e)))?;

        // JSON string literals are valid JS string literals
        let literal = serde_json::to_string(html)
            .map_err(|e| Error::RenderError(format!("Failed to encode document: {}", e)))?;
        let script = format!(
            "(async function() {{ document.open(); document.write({}); document.close(); \
             if (document.fonts) {{ await document.fonts.ready; }} return true; }})()",
            literal
        );

        self.tab
            .evaluate(&script, true)
            .map_err(|e| Error::CdpError(format!("Failed to write document: {}", e)))?;
        Ok(())
    }

    /// Size of the rendered document in CSS pixels
    fn document_size(&self) -> Result<(u32, u32)> {
        let eval = self
            .tab
            .evaluate(
                "JSON.stringify([document.documentElement.scrollWidth, document.documentElement.scrollHeight])",
                false,
            )
            .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;

        let raw = eval
            .value
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| Error::RenderError("No value returned from evaluation".into()))?;
        let dims: (u32, u32) = serde_json::from_str(&raw)
            .map_err(|e| Error::RenderError(format!("Unexpected document size {:?}: {}", raw, e)))?;
        Ok(dims)
    }
}

impl Renderer for ChromeRenderer {
    fn render_png(&mut self, html: &str, options: &RenderOptions) -> Result<Vec<u8>> {
        let viewport = options.viewport;
        self.load_document(html)?;

        let (width, height) = if options.full_page {
            let (doc_w, doc_h) = self.document_size()?;
            let height = doc_h.max(viewport.height);
            if height > MAX_PAGE_HEIGHT {
                warn!("document is {}px tall; capture truncated to {}px", height, MAX_PAGE_HEIGHT);
            }
            (doc_w.max(viewport.width), height.min(MAX_PAGE_HEIGHT))
        } else {
            (viewport.width, viewport.height)
        };

        self.tab
            .set_bounds(Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(f64::from(width)),
                height: Some(f64::from(height)),
            })
            .map_err(|e| Error::CdpError(format!("Failed to resize window: {}", e)))?;

        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(width),
            height: f64::from(height),
            scale: viewport.device_scale_factor,
        };

        let png = self
            .tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        debug!(
            "captured {}x{} @{}x ({} bytes)",
            width,
            height,
            viewport.device_scale_factor,
            png.len()
        );
        Ok(png)
    }

    fn is_connected(&self) -> bool {
        self.browser.get_version().is_ok()
    }

    fn close(self: Box<Self>) -> Result<()> {
        // Dropping the browser terminates the child process
        let this = *self;
        drop(this.tab);
        drop(this.browser);
        Ok(())
    }
}
