mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;

/// GETs `url` and returns the body of a successful response.
///
/// # Errors
///
/// Fails on transport errors and on any non-success status; the error
/// carries the status and the start of the response body.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid url '{url}'"))?,
    );

    let resp = client.execute(req).await?;
    let status = resp.status();
    let body = resp.bytes().await?;
    if !status.is_success() {
        let snippet = String::from_utf8_lossy(&body[..body.len().min(200)]).into_owned();
        bail!("GET {url} returned status {status}: {snippet}");
    }
    Ok(body.to_vec())
}

/// [`fetch_bytes`], then decodes the body as JSON.
pub async fn fetch_json<C: HttpClient, T: DeserializeOwned>(client: &C, url: &str) -> Result<T> {
    let bytes = fetch_bytes(client, url).await?;
    serde_json::from_slice(&bytes).with_context(|| format!("decoding response from {url}"))
}
