use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::CoreError;

/// Freshness headers captured from a fetch response. Lifetime is the fetch
/// call only.
#[derive(Clone, Debug, Default)]
pub struct FetchMeta {
    pub cache_control: Option<String>,
    pub expires: Option<String>,
}

/// Downloads a URL to a local path, surfacing freshness headers.
///
/// Only `http`/`https` schemes need be supported. On timeout, DNS failure,
/// non-2xx response, or I/O error the call fails and the target path must
/// not be left containing a partial file.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, target_path: &Path) -> Result<FetchMeta, CoreError>;
}

/// Default `Fetcher` backed by `reqwest`.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        Self { client }
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str, target_path: &Path) -> Result<FetchMeta, CoreError> {
        let parsed = url::Url::parse(url).map_err(|e| CoreError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(CoreError::FetchFailed {
                url: url.to_string(),
                reason: format!("unsupported scheme `{}`", parsed.scheme()),
            });
        }

        info!(url, "fetching public key");
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| CoreError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let response = response.error_for_status().map_err(|e| CoreError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let meta = FetchMeta {
            cache_control: header_value(&response, reqwest::header::CACHE_CONTROL),
            expires: header_value(&response, reqwest::header::EXPIRES),
        };

        let bytes = response.bytes().await.map_err(|e| CoreError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if let Some(parent) = target_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp_path = tmp_sibling(target_path);
        if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, target_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            warn!(url, error = %e, "failed to install fetched key atomically");
            return Err(e.into());
        }

        Ok(meta)
    }
}

fn header_value(response: &reqwest::Response, name: reqwest::header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn tmp_sibling(target_path: &Path) -> std::path::PathBuf {
    let file_name = target_path
        .file_name()
        .map(|n| format!(".{}.part", n.to_string_lossy()))
        .unwrap_or_else(|| ".fetch.part".to_string());
    target_path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;

    #[tokio::test]
    async fn fetch_writes_body_and_captures_headers() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/key.pub");
            then.status(200)
                .header("Cache-Control", "max-age=60")
                .body("-----BEGIN PUBLIC KEY-----\n");
        });

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("key.pub");
        let fetcher = ReqwestFetcher::new(Duration::from_secs(2));
        let meta = fetcher
            .fetch(&format!("{}/key.pub", server.base_url()), &target)
            .await
            .unwrap();

        assert_eq!(meta.cache_control.as_deref(), Some("max-age=60"));
        assert!(target.exists());
        mock.assert();
    }

    #[tokio::test]
    async fn non_2xx_response_fails_and_leaves_no_partial_file() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/missing.pub");
            then.status(404);
        });

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing.pub");
        let fetcher = ReqwestFetcher::new(Duration::from_secs(2));
        let result = fetcher
            .fetch(&format!("{}/missing.pub", server.base_url()), &target)
            .await;

        assert!(result.is_err());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("key.pub");
        let fetcher = ReqwestFetcher::new(Duration::from_secs(2));
        let result = fetcher.fetch("ftp://ex.test/key.pub", &target).await;
        assert!(result.is_err());
    }
}
