use sha1::{Digest, Sha1};

/// Derives a stable, opaque 40-character lowercase hex identifier from a
/// public-key URL. No cryptographic property of SHA-1 is relied upon here;
/// it is used purely because it is a convenient fixed-width digest.
pub fn digest(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    let bytes = hasher.finalize();
    let mut out = String::with_capacity(40);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
