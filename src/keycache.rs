use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::fetch::{FetchMeta, Fetcher};
use crate::index::KeyIndex;

/// Turns a public-key URL into a fresh, parseable local file, fetching and
/// recovering from staleness/corruption at most once per call.
pub struct KeyCacheManager {
    index: KeyIndex,
    fetcher: Arc<dyn Fetcher>,
    keys_dir: PathBuf,
    cache_max_size: usize,
}

impl KeyCacheManager {
    pub fn new(index: KeyIndex, fetcher: Arc<dyn Fetcher>, config: &EngineConfig) -> Self {
        Self {
            index,
            fetcher,
            keys_dir: config.keys_dir(),
            cache_max_size: config.cache_max_size,
        }
    }

    /// Returns a filesystem path to a fresh, parseable public key for `url`,
    /// fetching and/or re-fetching at most once.
    pub async fn get_local_key_path(&self, url: &str) -> Result<PathBuf, CoreError> {
        let mut already_fetched = false;

        let mut path = self.index.get_path(url);
        if path.is_empty() {
            debug!(url, "cold miss, no cached key path");
            self.index.remove(url);
            let target = self.default_target_path(url);
            self.fetch_and_record(url, &target, &mut already_fetched)
                .await?;
            path = target.to_string_lossy().into_owned();
        }
        let mut path = PathBuf::from(path);

        // A key fetched earlier in this call is fresh for the rest of this
        // call no matter what expiration got stamped on it; the stamp only
        // governs whether the *next* call needs to re-fetch.
        if !already_fetched && self.is_expired(url) {
            warn!(url, "cached key expired");
            self.index.remove(url);
            self.fetch_and_record(url, &path, &mut already_fetched)
                .await?;
            if self.index.get_expiration(url) == 0 {
                self.index.remove(url);
                return Err(CoreError::Expired {
                    url: url.to_string(),
                });
            }
        }

        if let Err(first_err) = parse_public_key_file(&path) {
            warn!(url, error = %first_err, "cached key file unreadable");
            self.index.remove(url);
            if already_fetched {
                return Err(CoreError::KeyUnreadable {
                    path: path.display().to_string(),
                    reason: first_err,
                });
            }
            self.fetch_and_record(url, &path, &mut already_fetched)
                .await?;
            if let Err(second_err) = parse_public_key_file(&path) {
                self.index.remove(url);
                return Err(CoreError::KeyUnreadable {
                    path: path.display().to_string(),
                    reason: second_err,
                });
            }
        }

        path = PathBuf::from(self.index.get_path(url));
        Ok(path)
    }

    async fn fetch_and_record(
        &self,
        url: &str,
        target: &Path,
        already_fetched: &mut bool,
    ) -> Result<(), CoreError> {
        if *already_fetched {
            return Err(CoreError::FetchFailed {
                url: url.to_string(),
                reason: "at most one fetch is permitted per call".to_string(),
            });
        }
        let meta = self.fetcher.fetch(url, target).await?;
        *already_fetched = true;

        self.enforce_cache_bound_before_insert(url);

        self.index.put(url, &target.to_string_lossy());
        let expiration = stamp_expiration(&meta);
        self.index.set_expiration(url, expiration);
        info!(url, expiration, "recorded key in index");
        Ok(())
    }

    fn is_expired(&self, url: &str) -> bool {
        let now = now_secs();
        let expiration = self.index.get_expiration(url);
        expiration == 0 || expiration <= now
    }

    fn default_target_path(&self, url: &str) -> PathBuf {
        let basename = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("key");
        self.keys_dir.join(basename)
    }

    /// Evicts the least-recently-stamped tracked URL before a new one is
    /// recorded, if that would push the index past `cache_max_size`.
    fn enforce_cache_bound_before_insert(&self, incoming_url: &str) {
        let urls = self.index.list_urls();
        if urls.iter().any(|u| u == incoming_url) || urls.len() < self.cache_max_size {
            return;
        }
        if let Some(victim) = urls
            .iter()
            .min_by_key(|u| self.index.get_expiration(u))
        {
            debug!(evicted = victim.as_str(), "cache_max_size reached, evicting");
            self.index.remove(victim);
        }
    }
}

/// Starting from `now`: prefer `Cache-Control: s-maxage=N`, fall back to
/// `max-age=N`, then `Expires` (RFC-1123), else `now` (immediately
/// expired, forcing a re-fetch next time without failing the current call).
fn stamp_expiration(meta: &FetchMeta) -> u64 {
    let now = now_secs();
    if let Some(cache_control) = &meta.cache_control {
        if let Some(seconds) = directive_value(cache_control, "s-maxage") {
            return now.saturating_add(seconds);
        }
        if let Some(seconds) = directive_value(cache_control, "max-age") {
            return now.saturating_add(seconds);
        }
    }
    if let Some(expires) = &meta.expires
        && let Ok(parsed) = httpdate::parse_http_date(expires)
        && let Ok(duration) = parsed.duration_since(UNIX_EPOCH)
    {
        return duration.as_secs();
    }
    now
}

fn directive_value(cache_control: &str, directive: &str) -> Option<u64> {
    cache_control.split(',').find_map(|part| {
        let part = part.trim();
        let (name, value) = part.split_once('=')?;
        if name.trim().eq_ignore_ascii_case(directive) {
            value.trim().parse::<u64>().ok()
        } else {
            None
        }
    })
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Attempts to parse the file at `path` as a P-256 public key (PEM
/// preferred, permissive). Returns the parse-failure reason as a string on
/// failure; the caller decides whether that is terminal or triggers a
/// single re-fetch.
pub(crate) fn parse_public_key_file(path: &Path) -> Result<p256::ecdsa::VerifyingKey, String> {
    let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
    crate::jwt::parse_verifying_key(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_prefers_s_maxage_over_max_age() {
        let meta = FetchMeta {
            cache_control: Some("max-age=10, s-maxage=30".to_string()),
            expires: None,
        };
        let now = now_secs();
        let expiration = stamp_expiration(&meta);
        assert!(expiration >= now + 30 && expiration < now + 31);
    }

    #[test]
    fn stamp_falls_back_to_max_age() {
        let meta = FetchMeta {
            cache_control: Some("max-age=45".to_string()),
            expires: None,
        };
        let now = now_secs();
        let expiration = stamp_expiration(&meta);
        assert!(expiration >= now + 45 && expiration < now + 46);
    }

    #[test]
    fn stamp_parses_expires_header() {
        let future = now_secs() + 3600;
        let as_system_time = UNIX_EPOCH + std::time::Duration::from_secs(future);
        let formatted = httpdate::fmt_http_date(as_system_time);
        let meta = FetchMeta {
            cache_control: None,
            expires: Some(formatted),
        };
        let expiration = stamp_expiration(&meta);
        assert_eq!(expiration, future);
    }

    #[test]
    fn stamp_defaults_to_now_when_no_headers_present() {
        let meta = FetchMeta {
            cache_control: None,
            expires: None,
        };
        let before = now_secs();
        let expiration = stamp_expiration(&meta);
        let after = now_secs();
        assert!(expiration >= before && expiration <= after);
    }
}
