use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Compute SHA-256 of an in-memory byte slice.
pub fn sha256_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Encode a raw 32-byte hash as a lowercase hex string (64 chars).
pub fn to_hex(hash: &[u8; 32]) -> String {
    hash.iter().map(|b| format!("{b:02x}")).collect()
}

/// Keep an uploaded file's extension only if it is short and alphanumeric.
pub fn sanitize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        "bin".to_string()
    } else {
        ext
    }
}

/// First two hex chars pick the subdirectory; shorter keys are used whole.
fn shard(hash_hex: &str) -> &str {
    hash_hex.get(..2).unwrap_or(hash_hex)
}

/// Derive the content-addressed storage path for a given hash.
/// Layout: `<base>/<first_2_hex_chars>/<full_hex>.<ext>`
pub fn attachment_path(uploads_dir: &Path, hash_hex: &str, ext: &str) -> PathBuf {
    uploads_dir
        .join(shard(hash_hex))
        .join(format!("{hash_hex}.{ext}"))
}

/// Public URL of a stored receipt, mirroring [`attachment_path`] under `/uploads`.
pub fn receipt_url(hash_hex: &str, ext: &str) -> String {
    format!("/uploads/{}/{hash_hex}.{ext}", shard(hash_hex))
}
