use std::sync::Arc;

use serde_json::Value;

use crate::certificate::CertificateRegistry;
use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::fetch::{Fetcher, ReqwestFetcher};
use crate::index::KeyIndex;
use crate::jwt::{self, SignedPassport, VerifiedPassport};
use crate::keycache::KeyCacheManager;
use crate::kvstore::{FileKeyValueStore, KeyValueStore};

/// Owns the configuration, key cache manager, and certificate registry.
/// Constructed once at startup and held by every caller rather than reached
/// for as a process-wide global.
pub struct StirShakenEngine {
    config: EngineConfig,
    key_cache: KeyCacheManager,
    registry: Arc<dyn CertificateRegistry>,
}

impl StirShakenEngine {
    /// Builds an engine with the default file-backed key-value store and
    /// `reqwest`-backed fetcher. Creates `data_dir` if absent; performs no
    /// network access.
    pub fn new(config: EngineConfig, registry: Arc<dyn CertificateRegistry>) -> std::io::Result<Self> {
        std::fs::create_dir_all(config.index_dir())?;
        std::fs::create_dir_all(config.keys_dir())?;
        let store: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(config.index_dir()));
        let fetcher: Arc<dyn Fetcher> = Arc::new(ReqwestFetcher::new(config.curl_timeout));
        Ok(Self::with_collaborators(config, store, fetcher, registry))
    }

    /// Builds an engine over caller-supplied collaborators, for tests and
    /// alternative deployments (in-memory store, canned fetcher, ...).
    pub fn with_collaborators(
        config: EngineConfig,
        store: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn Fetcher>,
        registry: Arc<dyn CertificateRegistry>,
    ) -> Self {
        let index = KeyIndex::new(store);
        let key_cache = KeyCacheManager::new(index, fetcher, &config);
        Self {
            config,
            key_cache,
            registry,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Resolves a local, fresh, parseable public key path for `url`. Exposed
    /// for callers that want to pre-warm or inspect the cache directly.
    pub async fn get_local_key_path(&self, url: &str) -> Result<std::path::PathBuf, CoreError> {
        self.key_cache.get_local_key_path(url).await
    }

    pub async fn verify(
        &self,
        header_str: &str,
        payload_str: &str,
        signature_b64: &str,
        alg: &str,
        public_key_url: &str,
    ) -> Result<VerifiedPassport, CoreError> {
        jwt::verify(
            header_str,
            payload_str,
            signature_b64,
            alg,
            public_key_url,
            &self.key_cache,
        )
        .await
    }

    pub async fn sign(&self, input: &Value) -> Result<SignedPassport, CoreError> {
        jwt::sign(input, self.registry.as_ref(), self.config.iat_seconds_only).await
    }
}
