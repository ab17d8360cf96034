use async_trait::async_trait;

/// A certificate handle, consumed only. Exposes the public-key URL to embed
/// as `x5u` and an opaque private-key reference usable by the signer.
pub trait Certificate: Send + Sync {
    fn public_key_url(&self) -> &str;
    fn private_key(&self) -> &p256::ecdsa::SigningKey;
}

/// Caller-ID-indexed certificate lookup. Implemented outside this crate in
/// production (certificate-to-phone-number registry); the core only
/// consumes this read interface.
#[async_trait]
pub trait CertificateRegistry: Send + Sync {
    async fn lookup_by_caller_id(&self, tn: &str) -> Option<std::sync::Arc<dyn Certificate>>;
}
