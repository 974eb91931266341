//! agendashot
//!
//! An HTML-to-PNG rendering service backed by a headless browser, plus a
//! scheduled job that lays out each organization's daily appointments as a
//! calendar image and announces it through a webhook.
//!
//! # Features
//!
//! - **Schedule layout engine** ([`agenda`]): pure, deterministic grid layout
//!   with overlap columns and proportional pixel geometry
//! - **CDP backend** (default): rasterizes through headless Chrome
//! - **Shared browser** ([`browser::SharedBrowser`]): one long-lived renderer
//!   reused across requests and re-created when it dies
//!
//! # Example
//!
//! ```no_run
//! use agendashot::{RenderOptions, Renderer, RendererConfig, Viewport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RendererConfig {
//!     viewport: Viewport { width: 800, height: 1200, device_scale_factor: 1.0 },
//!     timeout_ms: 30000,
//!     ..Default::default()
//! };
//!
//! let mut renderer = agendashot::new_renderer(&config)?;
//! let png = renderer.render_png("<h1>Hello</h1>", &RenderOptions::default())?;
//! std::fs::write("hello.png", png)?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod error;
pub use error::{Error, Result};

pub mod agenda;
pub mod time;

#[cfg(feature = "cdp")]
pub mod cdp;

// Async handle around a single long-lived renderer
pub mod browser;
pub use browser::SharedBrowser;

pub mod config;
pub mod job;
pub mod server;
pub mod source;
pub mod storage;
pub mod trigger;
pub mod webhook;

/// Configuration for the renderer
///
/// The defaults match the service's landscape output: a 1200x800 viewport
/// rendered at 2x, with a 30 second budget per render.
///
/// # Examples
///
/// ```
/// let cfg = agendashot::RendererConfig::default();
/// assert_eq!(cfg.timeout_ms, 30000);
/// ```
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Browser window size used at launch
    pub viewport: Viewport,
    /// Upper bound for a single render in milliseconds
    pub timeout_ms: u64,
    /// Explicit browser binary; auto-detected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether to keep the browser sandbox enabled
    pub sandbox: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            viewport: Viewport::landscape_hidpi(),
            timeout_ms: 30000,
            chrome_path: None,
            sandbox: true,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    /// Output pixels per CSS pixel
    pub device_scale_factor: f64,
}

impl Viewport {
    /// 800x1200 portrait at 1x, used for schedule snapshots
    pub fn portrait() -> Self {
        Self {
            width: 800,
            height: 1200,
            device_scale_factor: 1.0,
        }
    }

    /// 1200x800 landscape at 2x, used for caller-supplied documents
    pub fn landscape_hidpi() -> Self {
        Self {
            width: 1200,
            height: 800,
            device_scale_factor: 2.0,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::landscape_hidpi()
    }
}

/// Per-render options
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub viewport: Viewport,
    /// Capture the whole document instead of only the viewport
    pub full_page: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            viewport: Viewport::default(),
            full_page: false,
        }
    }
}

impl RenderOptions {
    /// Options for rasterizing a schedule document
    pub fn agenda() -> Self {
        Self {
            viewport: Viewport::portrait(),
            full_page: true,
        }
    }
}

/// Core trait for rendering backends: HTML in, PNG bytes out
///
/// Implementations are not required to be `Send`; [`SharedBrowser`] keeps a
/// renderer on its own worker thread and talks to it over a channel.
pub trait Renderer {
    /// Rasterize an HTML document to PNG
    fn render_png(&mut self, html: &str, options: &RenderOptions) -> Result<Vec<u8>>;

    /// Whether the underlying browser is still usable
    fn is_connected(&self) -> bool;

    /// Close the renderer and clean up resources
    fn close(self: Box<Self>) -> Result<()>;
}

/// Creates renderers on demand; called on the worker thread that will own them.
pub type RendererFactory = Box<dyn FnMut(&RendererConfig) -> Result<Box<dyn Renderer>> + Send>;

/// Create a renderer with the default backend
#[cfg(feature = "cdp")]
pub fn new_renderer(config: &RendererConfig) -> Result<Box<dyn Renderer>> {
    Ok(Box::new(cdp::ChromeRenderer::launch(config)?))
}

/// Without the `cdp` feature there is no backend to launch.
#[cfg(not(feature = "cdp"))]
pub fn new_renderer(_config: &RendererConfig) -> Result<Box<dyn Renderer>> {
    Err(Error::InitializationError(
        "built without a rendering backend (enable the `cdp` feature)".into(),
    ))
}

/// Factory for the default backend, suitable for [`SharedBrowser::spawn`]
pub fn default_factory() -> RendererFactory {
    Box::new(|config: &RendererConfig| new_renderer(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RendererConfig::default();
        assert_eq!(config.viewport.width, 1200);
        assert_eq!(config.viewport.height, 800);
        assert_eq!(config.viewport.device_scale_factor, 2.0);
        assert!(config.sandbox);
    }

    #[test]
    fn test_viewport_presets() {
        let portrait = Viewport::portrait();
        assert_eq!((portrait.width, portrait.height), (800, 1200));
        assert_eq!(portrait.device_scale_factor, 1.0);

        let agenda = RenderOptions::agenda();
        assert!(agenda.full_page);
        assert_eq!(agenda.viewport, portrait);
    }
}
