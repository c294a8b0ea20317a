//! HTTP plumbing shared by the synthesis providers and the image search.

use anyhow::{Context, Result, bail};
use reqwest::{Client, Response};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client for the provider chain and the search backends. Individual
/// requests tighten the overall timeout where a provider needs it.
///
/// Falls back to the default client if the builder fails.
pub fn default_http_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(OVERALL_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Collect a binary body (audio, image) under a hard ceiling.
///
/// A `Content-Length` above the ceiling is rejected before any byte is read;
/// without one, the stream is abandoned the moment the running total would
/// cross the ceiling. Partial audio or a cut-off image is worthless, so an
/// overrun is an error rather than a truncation.
pub async fn bounded_bytes(resp: Response, ceiling: usize) -> Result<Vec<u8>> {
    if let Some(advertised) = resp.content_length()
        && advertised as usize > ceiling
    {
        bail!("declared body of {advertised} bytes exceeds the {ceiling} byte ceiling");
    }
    let mut resp = resp;
    let mut buf = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("body read failed")? {
        if buf.len() + chunk.len() > ceiling {
            bail!("body exceeds the {ceiling} byte ceiling");
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Collect a text body up to `ceiling` bytes, silently dropping the rest.
/// Lossy UTF-8: the only caller scans scraped HTML for patterns and never
/// renders it.
pub async fn bounded_text(resp: Response, ceiling: usize) -> Result<String> {
    let mut resp = resp;
    let mut buf = Vec::new();
    while let Some(chunk) = resp.chunk().await.context("body read failed")? {
        let room = ceiling - buf.len();
        if chunk.len() >= room {
            buf.extend_from_slice(&chunk[..room]);
            break;
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
