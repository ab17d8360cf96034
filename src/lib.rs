//! STIR/SHAKEN PASSporT verification and signing engine.
//!
//! Resolves public-key URLs through a local, restart-durable cache
//! (downloading and re-validating freshness as needed), enforces the
//! `ES256`/`passport`/`shaken` profile on ingress and egress, and performs
//! ECDSA P-256/SHA-256 signing and verification over the detached
//! signature carried alongside a call identity assertion.
//!
//! Configuration loading, HTTP transport, and the certificate-to-phone-number
//! registry are external collaborators; this crate only consumes the
//! interfaces described in `certificate`, `fetch`, and `kvstore`.

pub mod certificate;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod index;
pub mod jwt;
pub mod keycache;
pub mod kvstore;

pub use certificate::{Certificate, CertificateRegistry};
pub use config::EngineConfig;
pub use engine::StirShakenEngine;
pub use error::CoreError;
pub use fetch::{FetchMeta, Fetcher, ReqwestFetcher};
pub use jwt::{SignedPassport, VerifiedPassport};
pub use kvstore::{FileKeyValueStore, KeyValueStore};
