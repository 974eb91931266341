//! HTTP surface
//!
//! `POST /generate-image` rasterizes caller-supplied HTML and stores the PNG,
//! `GET /health` reports liveness, and `POST /jobs/daily-agenda/run` runs one
//! agenda cycle on demand.

use crate::browser::SharedBrowser;
use crate::config::ServerConfig;
use crate::job::DailyAgendaJob;
use crate::storage::{object_key, ObjectStore};
use crate::{Error, RenderOptions, Viewport};
use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub struct AppState {
    pub browser: SharedBrowser,
    pub store: Arc<dyn ObjectStore>,
    /// `None` when no appointment source is configured
    pub job: Option<Arc<DailyAgendaJob>>,
    pub started_at: Instant,
    /// Key prefix for images produced by `/generate-image`
    pub image_prefix: String,
}

impl AppState {
    pub fn new(browser: SharedBrowser, store: Arc<dyn ObjectStore>, image_prefix: &str) -> Self {
        Self {
            browser,
            store,
            job: None,
            started_at: Instant::now(),
            image_prefix: image_prefix.to_string(),
        }
    }

    pub fn with_job(mut self, job: Arc<DailyAgendaJob>) -> Self {
        self.job = Some(job);
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    #[serde(default)]
    pub html_content: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub success: bool,
    pub image_url: String,
    /// Milliseconds spent rendering and uploading
    pub processing_time: u64,
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    success: bool,
    error: String,
}

fn failure(err: &Error) -> HttpResponse {
    let body = FailureResponse {
        success: false,
        error: err.to_string(),
    };
    if err.is_client_error() {
        HttpResponse::BadRequest().json(body)
    } else {
        HttpResponse::InternalServerError().json(body)
    }
}

fn required(value: Option<&str>, field: &str) -> Result<String, Error> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(Error::Validation(format!("{} is required", field))),
    }
}

async fn generate_image(req: web::Json<GenerateImageRequest>, state: web::Data<AppState>) -> HttpResponse {
    let started = Instant::now();

    let (html, filename) = match required(req.html_content.as_deref(), "htmlContent")
        .and_then(|html| required(req.filename.as_deref(), "filename").map(|name| (html, name)))
    {
        Ok(fields) => fields,
        Err(e) => return failure(&e),
    };

    let options = RenderOptions {
        viewport: Viewport::landscape_hidpi(),
        full_page: false,
    };
    let key = object_key(&state.image_prefix, &filename);

    let result = async {
        let png = state.browser.render(&html, options).await?;
        state.store.upload(&key, png, "image/png").await
    }
    .await;

    match result {
        Ok(image_url) => {
            let processing_time = started.elapsed().as_millis() as u64;
            info!("generated {} in {}ms", key, processing_time);
            HttpResponse::Ok().json(GenerateImageResponse {
                success: true,
                image_url,
                processing_time,
            })
        }
        Err(e) => {
            error!("generate-image for {} failed: {}", key, e);
            failure(&e)
        }
    }
}

/// Resident set size of this process, when the platform exposes it
fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

/// `VmRSS` from a `/proc/<pid>/status` listing, in bytes
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find_map(|l| l.strip_prefix("VmRSS:"))?;
    let mut fields = line.split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => value.checked_mul(1024),
        Some(_) => None,
    }
}

async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "memory": { "rssBytes": resident_memory_bytes() },
        "browserConnected": state.browser.is_connected(),
    }))
}

async fn index(state: web::Data<AppState>) -> HttpResponse {
    let mut endpoints = vec!["POST /generate-image", "GET /health"];
    if state.job.is_some() {
        endpoints.push("POST /jobs/daily-agenda/run");
    }
    HttpResponse::Ok().json(serde_json::json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": endpoints,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct RunJobRequest {
    #[serde(default)]
    pub force: bool,
}

async fn run_daily_agenda(body: Option<web::Json<RunJobRequest>>, state: web::Data<AppState>) -> HttpResponse {
    let Some(job) = state.job.clone() else {
        return HttpResponse::NotFound().json(FailureResponse {
            success: false,
            error: "daily agenda job is not configured".into(),
        });
    };
    let force = body.map(|b| b.force).unwrap_or(false);

    match job.run_cycle(Utc::now(), force).await {
        Ok(results) => HttpResponse::Ok().json(serde_json::json!({
            "success": true,
            "results": results,
        })),
        Err(e) => {
            error!("manual agenda run failed: {}", e);
            failure(&e)
        }
    }
}

/// Malformed JSON bodies get the same `{success:false, error}` shape as other failures.
fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::BadRequest().json(FailureResponse {
        success: false,
        error: format!("Invalid request: {}", err),
    });
    InternalError::from_response(err, response).into()
}

/// Registers the routes; shared by [`start_server`] and the tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().limit(10 * 1024 * 1024).error_handler(json_error_handler))
        .route("/", web::get().to(index))
        .route("/health", web::get().to(health))
        .route("/generate-image", web::post().to(generate_image))
        .route("/jobs/daily-agenda/run", web::post().to(run_daily_agenda));
}

/// Serves until shutdown, then closes the shared browser.
pub async fn start_server(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let app_state = web::Data::new(state);
    let browser = app_state.browser.clone();

    info!("listening on {}:{}", config.host, config.port);
    let server_state = app_state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .app_data(server_state.clone())
            .wrap(middleware::Logger::default())
            .configure(configure)
    })
    .workers(config.workers.max(1))
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    if let Err(e) = browser.close().await {
        error!("failed to close browser: {}", e);
    }
    info!("server stopped");
    result
}
