use crate::{Error, RenderOptions, Renderer, RendererConfig, RendererFactory, Result};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

enum Command {
    Render(String, RenderOptions, oneshot::Sender<Result<Vec<u8>>>),
    Launch(oneshot::Sender<Result<()>>),
    Close(oneshot::Sender<Result<()>>),
}

/// An async-friendly handle to the single long-lived renderer.
///
/// A dedicated worker thread owns the renderer and executes commands sent
/// from async tasks, so renderers that are not `Send` can still be used from
/// request handlers. Commands are processed one at a time, which serializes
/// access to the browser.
///
/// The renderer is created lazily on first use and re-created whenever it
/// reports that it is no longer connected or a render overran the timeout.
/// Renders whose caller already gave up are skipped. Dropping every clone of
/// the handle stops the worker and releases the browser.
#[derive(Clone)]
pub struct SharedBrowser {
    cmd_tx: Sender<Command>,
    connected: Arc<AtomicBool>,
    timeout: Duration,
}

impl SharedBrowser {
    /// Spawn the worker thread. The browser itself is not launched until needed.
    pub fn spawn(config: RendererConfig, factory: RendererFactory) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let connected = Arc::new(AtomicBool::new(false));
        let timeout = Duration::from_millis(config.timeout_ms);

        let worker_flag = connected.clone();
        thread::spawn(move || worker_loop(config, factory, cmd_rx, worker_flag));

        Self {
            cmd_tx,
            connected,
            timeout,
        }
    }

    /// Shared browser backed by the default backend
    pub fn with_default_backend(config: RendererConfig) -> Self {
        Self::spawn(config, crate::default_factory())
    }

    /// Last known liveness of the browser
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Launch the browser now instead of on the first render.
    pub async fn warm_up(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Launch(tx))?;
        self.await_reply(rx, "Launch").await
    }

    /// Rasterize `html`, bounded by the configured timeout.
    pub async fn render(&self, html: &str, options: RenderOptions) -> Result<Vec<u8>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Render(html.to_string(), options, tx))?;
        self.await_reply(rx, "Render").await
    }

    /// Shutdown the background worker and close the browser.
    pub async fn close(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Close(tx)).is_err() {
            // worker already gone
            return Ok(());
        }
        rx.await
            .map_err(|e| Error::Other(format!("Close canceled: {}", e)))?
    }

    fn send(&self, cmd: Command) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .map_err(|_| Error::RenderError("renderer worker has shut down".into()))
    }

    async fn await_reply<T>(&self, rx: oneshot::Receiver<Result<T>>, what: &str) -> Result<T> {
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(reply) => reply.map_err(|e| Error::Other(format!("{} canceled: {}", what, e)))?,
            Err(_) => {
                let ms = self.timeout.as_millis() as u64;
                warn!("{} did not finish within {}ms", what, ms);
                Err(Error::Timeout(ms))
            }
        }
    }
}

fn worker_loop(
    config: RendererConfig,
    mut factory: RendererFactory,
    cmd_rx: Receiver<Command>,
    connected: Arc<AtomicBool>,
) {
    let mut renderer: Option<Box<dyn Renderer>> = None;
    let deadline = Duration::from_millis(config.timeout_ms);

    // Command loop; ends when every handle is dropped
    while let Ok(cmd) = cmd_rx.recv() {
        match cmd {
            Command::Render(html, options, resp) => {
                if resp.is_closed() {
                    debug!("skipping render whose caller is gone");
                    continue;
                }
                let started = Instant::now();
                let res = ensure_renderer(&mut renderer, &mut factory, &config)
                    .and_then(|r| r.render_png(&html, &options));
                if started.elapsed() >= deadline {
                    // the caller already saw a timeout; a hung page may still hold the browser
                    warn!("render overran {}ms; discarding renderer", config.timeout_ms);
                    discard(&mut renderer);
                }
                connected.store(renderer.as_ref().is_some_and(|r| r.is_connected()), Ordering::SeqCst);
                let _ = resp.send(res);
            }
            Command::Launch(resp) => {
                let res = ensure_renderer(&mut renderer, &mut factory, &config).map(|_| ());
                connected.store(res.is_ok(), Ordering::SeqCst);
                let _ = resp.send(res);
            }
            Command::Close(resp) => {
                let res = renderer.take().map(|r| r.close()).unwrap_or(Ok(()));
                connected.store(false, Ordering::SeqCst);
                let _ = resp.send(res);
                break;
            }
        }
    }

    discard(&mut renderer);
    connected.store(false, Ordering::SeqCst);
}

fn discard(slot: &mut Option<Box<dyn Renderer>>) {
    if let Some(r) = slot.take() {
        if let Err(e) = r.close() {
            warn!("failed to close renderer: {}", e);
        }
    }
}

/// Returns a live renderer, launching a new one if there is none or the old one died.
fn ensure_renderer<'a>(
    slot: &'a mut Option<Box<dyn Renderer>>,
    factory: &mut RendererFactory,
    config: &RendererConfig,
) -> Result<&'a mut Box<dyn Renderer>> {
    if let Some(existing) = slot.take() {
        if existing.is_connected() {
            return Ok(slot.insert(existing));
        }
        warn!("renderer is no longer connected; relaunching");
        if let Err(e) = existing.close() {
            warn!("failed to close dead renderer: {}", e);
        }
    }

    info!("launching renderer");
    let fresh = factory(config)?;
    Ok(slot.insert(fresh))
}
