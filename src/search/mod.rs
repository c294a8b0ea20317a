//! Image search across interchangeable backends, plus the bounded download
//! step. Each backend is a descriptor (URL builder, headers, extractor)
//! queried through one executor; the caller picks a random candidate after
//! filtering out URLs already sent to the requester.

use crate::utils::{bounded_bytes, bounded_text};
use anyhow::{Context, Result, bail};
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Download ceiling; anything larger is rejected, not truncated.
pub const IMAGE_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Floor rejecting placeholder/error images.
pub const IMAGE_MIN_BYTES: usize = 5000;

const HTML_SCRAPE_LIMIT: usize = 2 * 1024 * 1024;

static GOOGLE_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\["(https?://[^"]+\.(?:jpg|jpeg|png|webp))",\d+,\d+\]"#).unwrap()
});

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub pixabay_key: Option<String>,
    pub pexels_key: Option<String>,
    /// Endpoint overrides, mainly for proxies. Defaults are the public APIs.
    pub unsplash_base: Option<String>,
    pub pixabay_base: Option<String>,
    pub pexels_base: Option<String>,
    pub google_base: Option<String>,
}

enum Extract {
    Json(fn(&serde_json::Value) -> Vec<String>),
    HtmlRegex,
}

struct Backend {
    id: &'static str,
    url: String,
    headers: Vec<(&'static str, String)>,
    extract: Extract,
}

fn unsplash_urls(body: &serde_json::Value) -> Vec<String> {
    body.pointer("/results")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.pointer("/urls/regular"))
                .filter_map(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn pixabay_urls(body: &serde_json::Value) -> Vec<String> {
    body.pointer("/hits")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.pointer("/webformatURL"))
                .filter_map(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn pexels_urls(body: &serde_json::Value) -> Vec<String> {
    body.pointer("/photos")
        .and_then(serde_json::Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.pointer("/src/large"))
                .filter_map(serde_json::Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

pub struct ImageSearcher {
    client: Client,
    config: SearchConfig,
}

impl ImageSearcher {
    pub fn new(config: SearchConfig, client: Client) -> Self {
        Self { client, config }
    }

    fn backends(&self, query: &str) -> Vec<Backend> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        let mut backends = vec![
            Backend {
                id: "unsplash",
                url: format!(
                    "{}/search/photos?query={}&per_page=20",
                    self.config
                        .unsplash_base
                        .as_deref()
                        .unwrap_or("https://unsplash.com/napi"),
                    encoded
                ),
                headers: vec![],
                extract: Extract::Json(unsplash_urls),
            },
            Backend {
                id: "google",
                url: format!(
                    "{}/search?q={}&tbm=isch",
                    self.config
                        .google_base
                        .as_deref()
                        .unwrap_or("https://www.google.com"),
                    encoded
                ),
                headers: vec![(
                    "User-Agent",
                    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, \
                     like Gecko) Chrome/120.0.0.0 Safari/537.36"
                        .into(),
                )],
                extract: Extract::HtmlRegex,
            },
        ];

        if let Some(key) = &self.config.pixabay_key {
            backends.push(Backend {
                id: "pixabay",
                url: format!(
                    "{}/api/?key={}&q={}&image_type=photo&per_page=30",
                    self.config
                        .pixabay_base
                        .as_deref()
                        .unwrap_or("https://pixabay.com"),
                    key,
                    encoded
                ),
                headers: vec![],
                extract: Extract::Json(pixabay_urls),
            });
        }

        if let Some(key) = &self.config.pexels_key {
            backends.push(Backend {
                id: "pexels",
                url: format!(
                    "{}/v1/search?query={}&per_page=30",
                    self.config
                        .pexels_base
                        .as_deref()
                        .unwrap_or("https://api.pexels.com"),
                    encoded
                ),
                headers: vec![("Authorization", key.clone())],
                extract: Extract::Json(pexels_urls),
            });
        }

        backends
    }

    async fn query_backend(&self, backend: &Backend) -> Result<Vec<String>> {
        let mut req = self.client.get(&backend.url).timeout(Duration::from_secs(10));
        for (name, value) in &backend.headers {
            req = req.header(*name, value);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} request failed", backend.id))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", backend.id))?;

        let urls = match &backend.extract {
            Extract::Json(extract) => {
                let body: serde_json::Value = resp.json().await?;
                extract(&body)
            }
            Extract::HtmlRegex => {
                let html = bounded_text(resp, HTML_SCRAPE_LIMIT).await?;
                GOOGLE_IMAGE_RE
                    .captures_iter(&html)
                    .map(|cap| cap[1].to_string())
                    .collect()
            }
        };
        Ok(urls
            .into_iter()
            .filter(|u| Url::parse(u).is_ok_and(|p| p.scheme() == "http" || p.scheme() == "https"))
            .collect())
    }

    /// Query every backend and return the non-empty candidate lists, one per
    /// backend. Backend failures are logged and skipped.
    pub async fn search(&self, query: &str) -> Vec<(&'static str, Vec<String>)> {
        let mut results = Vec::new();
        for backend in self.backends(query) {
            match self.query_backend(&backend).await {
                Ok(urls) if !urls.is_empty() => {
                    debug!(backend = backend.id, hits = urls.len(), "image candidates");
                    results.push((backend.id, urls));
                }
                Ok(_) => debug!(backend = backend.id, "no image candidates"),
                Err(e) => debug!(backend = backend.id, error = format!("{e:#}"), "backend failed"),
            }
        }
        results
    }

    /// Fetch one image with the size ceiling and the placeholder floor.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_secs(15))
            .send()
            .await
            .context("image download failed")?
            .error_for_status()
            .context("image download returned an error status")?;
        let bytes = bounded_bytes(resp, IMAGE_MAX_BYTES)
            .await
            .context("image download rejected")?;
        if bytes.len() < IMAGE_MIN_BYTES {
            bail!(
                "image too small ({} bytes), likely a placeholder",
                bytes.len()
            );
        }
        Ok(bytes)
    }
}

/// Random pick over per-backend candidate lists: first a non-empty source,
/// then a URL inside it, skipping anything `already_sent` rejects.
pub fn pick_candidate<F>(sources: &[(&'static str, Vec<String>)], already_sent: F) -> Option<String>
where
    F: Fn(&str) -> bool,
{
    if sources.is_empty() {
        return None;
    }
    // Start at a random source, then walk the rest so a fully-deduped source
    // does not end the search early
    let start = fastrand::usize(..sources.len());
    for offset in 0..sources.len() {
        let (_, urls) = &sources[(start + offset) % sources.len()];
        let fresh: Vec<&String> = urls.iter().filter(|u| !already_sent(u)).collect();
        if !fresh.is_empty() {
            return Some(fresh[fastrand::usize(..fresh.len())].clone());
        }
    }
    None
}
