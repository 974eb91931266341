//! Object storage for rendered images

use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use log::debug;
use reqwest::{header, Client};
use std::collections::BTreeMap;
use std::sync::Mutex;
use url::Url;

/// Storage backend: bytes + key in, public URL out
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous object, and return its public URL
    fn upload<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, Result<String>>;

    /// Public URL of `key` (the object may not exist)
    fn public_url(&self, key: &str) -> Result<String>;
}

/// Turns a caller-supplied filename into a storage key under `prefix`.
///
/// Path separators and anything outside `[A-Za-z0-9._-]` become `-`, leading
/// dots are dropped and a `.png` extension is ensured.
pub fn object_key(prefix: &str, filename: &str) -> String {
    let mut name: String = filename
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '-' })
        .collect();
    name = name.trim_start_matches('.').to_string();
    if name.is_empty() {
        name = "image".to_string();
    }
    if !name.to_ascii_lowercase().ends_with(".png") {
        name.push_str(".png");
    }

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        name
    } else {
        format!("{}/{}", prefix, name)
    }
}

/// REST object storage (`POST {base}/object/{bucket}/{key}`)
///
/// Public objects are served from `{base}/object/public/{bucket}/{key}`.
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
    bucket: String,
    api_key: String,
}

impl HttpObjectStore {
    pub fn new(base_url: &str, bucket: &str, api_key: &str) -> Result<Self> {
        // a trailing slash makes `join` append instead of replacing the last segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| Error::ConfigError(format!("invalid storage url {:?}: {}", base_url, e)))?;
        if bucket.trim().is_empty() {
            return Err(Error::ConfigError("storage bucket is empty".into()));
        }

        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url,
            bucket: bucket.trim().to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn object_url(&self, visibility: Option<&str>, key: &str) -> Result<Url> {
        let path = match visibility {
            Some(v) => format!("object/{}/{}/{}", v, self.bucket, key),
            None => format!("object/{}/{}", self.bucket, key),
        };
        self.base_url
            .join(&path)
            .map_err(|e| Error::ConfigError(format!("invalid object key {:?}: {}", key, e)))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let url = self.object_url(None, key)?;
        let size = bytes.len();

        let response = self
            .client
            .post(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("apikey", &self.api_key)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::UploadError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UploadError(format!("{} - {}", status, body)));
        }

        debug!("uploaded {} ({} bytes)", key, size);
        self.public_url(key)
    }
}

impl ObjectStore for HttpObjectStore {
    fn upload<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, Result<String>> {
        self.put(key, bytes, content_type).boxed()
    }

    fn public_url(&self, key: &str) -> Result<String> {
        Ok(self.object_url(Some("public"), key)?.to_string())
    }
}

/// In-memory store, used by tests and dry runs
pub struct MemoryStore {
    base_url: String,
    objects: Mutex<BTreeMap<String, (String, Vec<u8>)>>,
}

impl MemoryStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Content type and bytes stored under `key`
    pub fn get(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory://images")
    }
}

impl ObjectStore for MemoryStore {
    fn upload<'a>(&'a self, key: &'a str, bytes: Vec<u8>, content_type: &'a str) -> BoxFuture<'a, Result<String>> {
        async move {
            self.objects
                .lock()
                .map_err(|_| Error::UploadError("memory store poisoned".into()))?
                .insert(key.to_string(), (content_type.to_string(), bytes));
            self.public_url(key)
        }
        .boxed()
    }

    fn public_url(&self, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.base_url, key))
    }
}
