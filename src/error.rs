use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing required input: {0}")]
    MissingInput(&'static str),

    #[error("invalid STIR/SHAKEN shape: {field}")]
    ShapeInvalid { field: String },

    #[error("failed to fetch `{url}`: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("key at `{path}` is not a parseable public key: {reason}")]
    KeyUnreadable { path: String, reason: String },

    #[error("key for `{url}` expired and could not be refreshed")]
    Expired { url: String },

    #[error("signature verification failed")]
    SignatureInvalid,

    #[error("no certificate registered for caller id `{tn}`")]
    CertificateMissing { tn: String },

    #[error("cryptographic operation failed: {0}")]
    CryptoInternal(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Serde(#[from] serde_json::Error),
}
