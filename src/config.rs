//! Service configuration

use crate::trigger::parse_offset;
use crate::{Error, RendererConfig, Result};
use chrono::{FixedOffset, Offset, Utc};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// HTTP worker threads
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root of the object storage REST API; `None` keeps images in memory
    pub base_url: Option<String>,
    pub bucket: String,
    pub api_key: String,
    /// Key prefix for images produced by `POST /generate-image`
    pub image_prefix: String,
    /// Key prefix for daily agenda images
    pub agenda_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            bucket: "images".to_string(),
            api_key: String::new(),
            image_prefix: "images".to_string(),
            agenda_prefix: "agendas".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub base_url: String,
    pub api_key: String,
}

/// Offset assumed for organizations without a usable timezone (UTC-3)
pub const DEFAULT_FALLBACK_OFFSET_SECS: i32 = -3 * 3600;

#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Seconds between trigger checks
    pub interval_secs: u64,
    /// Offset used when an organization's timezone cannot be resolved
    pub fallback_offset: FixedOffset,
    /// 0 renders today's agenda, 1 tomorrow's
    pub day_offset: i64,
    /// Webhook used when an organization does not configure its own
    pub default_webhook_url: Option<String>,
    pub webhook_timeout: Duration,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15 * 60,
            fallback_offset: FixedOffset::east_opt(DEFAULT_FALLBACK_OFFSET_SECS).unwrap_or(Utc.fix()),
            day_offset: 0,
            default_webhook_url: None,
            webhook_timeout: Duration::from_secs(10),
        }
    }
}

impl JobConfig {
    /// Parses a fallback offset such as `-03:00`.
    pub fn parse_fallback(raw: &str) -> Result<FixedOffset> {
        parse_offset(raw).ok_or_else(|| Error::ConfigError(format!("invalid UTC offset {:?}", raw)))
    }
}

/// Complete configuration of the service
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub renderer: RendererConfig,
    pub storage: StorageConfig,
    /// Without a source the daily agenda job is disabled
    pub source: Option<SourceConfig>,
    pub job: JobConfig,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            return Err(Error::ConfigError("server.workers must be at least 1".into()));
        }
        if self.renderer.timeout_ms == 0 {
            return Err(Error::ConfigError("renderer timeout must be positive".into()));
        }
        let vp = self.renderer.viewport;
        if vp.width == 0 || vp.height == 0 || vp.device_scale_factor <= 0.0 {
            return Err(Error::ConfigError(format!("invalid viewport {:?}", vp)));
        }
        if self.storage.base_url.is_some() && self.storage.bucket.trim().is_empty() {
            return Err(Error::ConfigError("storage bucket is required with a storage url".into()));
        }
        if self.job.interval_secs == 0 {
            return Err(Error::ConfigError("job interval must be positive".into()));
        }
        if !(0..=7).contains(&self.job.day_offset) {
            return Err(Error::ConfigError(format!("day offset {} out of range 0..=7", self.job.day_offset)));
        }
        Ok(())
    }
}
