use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::pkcs8::DecodePublicKey;
use serde_json::Value;
use signature::{Signer, Verifier};
use tracing::info;

use crate::certificate::CertificateRegistry;
use crate::error::CoreError;
use crate::keycache::{parse_public_key_file, KeyCacheManager};

pub const ALG: &str = "ES256";
pub const TYP: &str = "passport";
pub const PPT: &str = "shaken";

#[derive(Clone, Debug)]
pub struct SignedPassport {
    pub header: Value,
    pub payload: Value,
    pub header_str: String,
    pub payload_str: String,
    /// base64, standard alphabet, with padding.
    pub signature: String,
    pub algorithm: String,
}

#[derive(Clone, Debug)]
pub struct VerifiedPassport {
    pub header: Value,
    pub payload: Value,
    pub signature: String,
    pub algorithm: String,
    pub public_key_url: String,
}

/// Returns deep copies of `header` and `payload`; never mutates `input`.
pub fn check_shape(input: &Value) -> Result<(Value, Value), CoreError> {
    let header = input.get("header").ok_or_else(|| shape_invalid("header"))?;
    let payload = input
        .get("payload")
        .ok_or_else(|| shape_invalid("payload"))?;

    if header.get("ppt").and_then(Value::as_str) != Some(PPT) {
        return Err(shape_invalid("header.ppt"));
    }
    if header.get("typ").and_then(Value::as_str) != Some(TYP) {
        return Err(shape_invalid("header.typ"));
    }
    if header.get("alg").and_then(Value::as_str) != Some(ALG) {
        return Err(shape_invalid("header.alg"));
    }
    let tn_is_non_empty = payload
        .pointer("/orig/tn")
        .and_then(Value::as_str)
        .is_some_and(|tn| !tn.is_empty());
    if !tn_is_non_empty {
        return Err(shape_invalid("payload.orig.tn"));
    }

    Ok((header.clone(), payload.clone()))
}

fn shape_invalid(field: &str) -> CoreError {
    CoreError::ShapeInvalid {
        field: field.to_string(),
    }
}

/// Signs the serialized `payload` object alone, matching `verify` below,
/// which checks the signature against `payload_str` exactly as supplied.
pub async fn sign(
    input: &Value,
    registry: &dyn CertificateRegistry,
    iat_seconds_only: bool,
) -> Result<SignedPassport, CoreError> {
    let (mut header, mut payload) = check_shape(input)?;

    let caller_tn = payload
        .pointer("/orig/tn")
        .and_then(Value::as_str)
        .expect("checked by check_shape")
        .to_string();

    let cert = registry
        .lookup_by_caller_id(&caller_tn)
        .await
        .ok_or_else(|| CoreError::CertificateMissing {
            tn: caller_tn.clone(),
        })?;

    header["x5u"] = Value::String(cert.public_key_url().to_string());
    payload["attest"] = Value::String("B".to_string());
    payload["origid"] = Value::String("asterisk".to_string());
    payload["iat"] = Value::Number(iat_now(iat_seconds_only).into());

    let payload_str = serde_json::to_string(&payload)?;
    let header_str = serde_json::to_string(&header)?;

    let signature: Signature = cert.private_key().sign(payload_str.as_bytes());
    let signature_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes().as_slice());

    info!(caller_tn, "signed passport");

    Ok(SignedPassport {
        header,
        payload,
        header_str,
        payload_str,
        signature: signature_b64,
        algorithm: ALG.to_string(),
    })
}

/// Does not re-check the STIR/SHAKEN profile shape; that's the caller's job.
pub async fn verify(
    header_str: &str,
    payload_str: &str,
    signature_b64: &str,
    alg: &str,
    public_key_url: &str,
    key_cache: &KeyCacheManager,
) -> Result<VerifiedPassport, CoreError> {
    for (name, value) in [
        ("header", header_str),
        ("payload", payload_str),
        ("signature", signature_b64),
        ("alg", alg),
        ("public_key_url", public_key_url),
    ] {
        if value.is_empty() {
            return Err(CoreError::MissingInput(name));
        }
    }

    let key_path = key_cache.get_local_key_path(public_key_url).await?;
    let verifying_key = parse_public_key_file(&key_path).map_err(|reason| CoreError::KeyUnreadable {
        path: key_path.display().to_string(),
        reason,
    })?;

    let signature_bytes = base64::engine::general_purpose::STANDARD
        .decode(signature_b64)
        .map_err(|_| CoreError::SignatureInvalid)?;
    let signature = Signature::try_from(signature_bytes.as_slice())
        .map_err(|_| CoreError::SignatureInvalid)?;

    verifying_key
        .verify(payload_str.as_bytes(), &signature)
        .map_err(|_| CoreError::SignatureInvalid)?;

    let header: Value = serde_json::from_str(header_str)?;
    let payload: Value = serde_json::from_str(payload_str)?;

    Ok(VerifiedPassport {
        header,
        payload,
        signature: signature_b64.to_string(),
        algorithm: alg.to_string(),
        public_key_url: public_key_url.to_string(),
    })
}

/// `tv_sec + tv_usec/1000` by default (mixes seconds and milliseconds), or
/// plain `tv_sec` when `seconds_only` is set.
fn iat_now(seconds_only: bool) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    if seconds_only {
        now.as_secs()
    } else {
        now.as_secs() + u64::from(now.subsec_micros()) / 1000
    }
}

/// Parses a byte buffer as a P-256 public key: PEM preferred, falling back
/// to DER SubjectPublicKeyInfo, then raw SEC1 point bytes.
pub(crate) fn parse_verifying_key(bytes: &[u8]) -> Result<VerifyingKey, String> {
    if let Ok(text) = std::str::from_utf8(bytes)
        && let Ok(key) = VerifyingKey::from_public_key_pem(text.trim())
    {
        return Ok(key);
    }
    if let Ok(key) = VerifyingKey::from_public_key_der(bytes) {
        return Ok(key);
    }
    VerifyingKey::from_sec1_bytes(bytes).map_err(|e| e.to_string())
}
