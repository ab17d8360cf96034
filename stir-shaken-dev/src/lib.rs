//! Dev-only certificate registry and key fixtures.
//!
//! Grown from the teacher's `DevDistributorSource`, which served packs and
//! components from a local directory instead of a real OCI registry: this
//! crate serves ECDSA keypairs and an in-memory certificate registry
//! instead of a real CA and phone-number lookup, so `stir-shaken-core` can
//! be exercised in tests and examples without a live network.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::EncodePublicKey;
use rand_core::OsRng;
use stir_shaken_core::{Certificate, CertificateRegistry};

/// A freshly generated ECDSA P-256 keypair plus its PEM-encoded public
/// half, ready to be written to disk and served as a `x5u` fixture.
pub struct DevKeyFixture {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    pub public_key_pem: String,
}

impl DevKeyFixture {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let verifying_key = signing_key.verifying_key().clone();
        let public_key_pem = verifying_key
            .to_public_key_pem(p256::pkcs8::LineEnding::LF)
            .expect("encoding a freshly generated key to PEM cannot fail");
        Self {
            signing_key,
            verifying_key,
            public_key_pem,
        }
    }

    /// Writes the PEM public key to `dir/name` and returns the path,
    /// mirroring the teacher's filesystem-backed dev source layout.
    pub fn write_public_key(&self, dir: &Path, name: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, &self.public_key_pem)?;
        Ok(path)
    }
}

/// A certificate handle backed by an in-memory signing key, for tests.
pub struct DevCertificate {
    public_key_url: String,
    signing_key: SigningKey,
}

impl DevCertificate {
    pub fn new(public_key_url: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            public_key_url: public_key_url.into(),
            signing_key,
        }
    }

    pub fn from_fixture(public_key_url: impl Into<String>, fixture: &DevKeyFixture) -> Self {
        Self::new(public_key_url, fixture.signing_key.clone())
    }
}

impl Certificate for DevCertificate {
    fn public_key_url(&self) -> &str {
        &self.public_key_url
    }

    fn private_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

/// A `CertificateRegistry` backed by a plain in-memory map, keyed by
/// caller-ID (telephone number). Analogous to the teacher's
/// `DevDistributorSource`: a dev-only stand-in for a real, externally
/// operated lookup service.
#[derive(Default)]
pub struct InMemoryCertificateRegistry {
    entries: RwLock<HashMap<String, Arc<DevCertificate>>>,
}

impl InMemoryCertificateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tn: impl Into<String>, cert: DevCertificate) {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .insert(tn.into(), Arc::new(cert));
    }
}

#[async_trait]
impl CertificateRegistry for InMemoryCertificateRegistry {
    async fn lookup_by_caller_id(&self, tn: &str) -> Option<Arc<dyn Certificate>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(tn)
            .cloned()
            .map(|cert| cert as Arc<dyn Certificate>)
    }
}
