use std::path::PathBuf;
use std::time::Duration;

/// Construction is infallible; no hidden parsing happens here.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Root directory under which `keys/stir_shaken/` and the persistent
    /// index live.
    pub data_dir: PathBuf,

    pub cache_max_size: usize,
    pub curl_timeout: Duration,

    /// X.509 trust anchors. Reserved: the core does not validate the
    /// certificate chain against these.
    pub ca_file: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,

    /// Consumed by the caller-supplied `CertificateRegistry`, not the core.
    pub store_path: Option<PathBuf>,
    pub store_public_key_url: Option<String>,

    /// When `true`, `iat` is stamped as plain `seconds_since_epoch`. When
    /// `false` (default), `tv_sec + tv_usec/1000` is preserved verbatim.
    pub iat_seconds_only: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            cache_max_size: 1000,
            curl_timeout: Duration::from_secs(2),
            ca_file: None,
            ca_path: None,
            store_path: None,
            store_public_key_url: None,
            iat_seconds_only: false,
        }
    }
}

impl EngineConfig {
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_cache_max_size(mut self, size: usize) -> Self {
        self.cache_max_size = size;
        self
    }

    pub fn with_curl_timeout(mut self, timeout: Duration) -> Self {
        self.curl_timeout = timeout;
        self
    }

    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys").join("stir_shaken")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.data_dir.join("index").join("stir_shaken")
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(root) = std::env::var("STIR_SHAKEN_DATA_DIR") {
        return PathBuf::from(root);
    }
    if let Some(data) = dirs_next::data_dir() {
        return data.join("stir-shaken");
    }
    PathBuf::from(".stir-shaken")
}
