// src/verify.rs

//! Blob verification gate
//!
//! Called during staging before any file write. The default gate checks
//! the SHA-256 digest declared by the repository; the trait seam is where
//! a signature backend would plug in.

use crate::error::{Error, Result};
use crate::repository::PackageMeta;
use sha2::{Digest, Sha256};
use tracing::debug;

/// SHA-256 hex digest of a byte slice
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Pass/fail gate applied to every blob before extraction
pub trait Verifier: Send + Sync {
    fn verify(&self, meta: &PackageMeta, blob: &[u8]) -> Result<()>;
}

/// Default verifier: blob digest must match the published checksum
#[derive(Debug, Default)]
pub struct ChecksumVerifier;

impl Verifier for ChecksumVerifier {
    fn verify(&self, meta: &PackageMeta, blob: &[u8]) -> Result<()> {
        debug!("Verifying checksum for {}", meta.ident());

        let actual = sha256_hex(blob);
        if actual != meta.checksum {
            return Err(Error::ChecksumMismatch {
                expected: meta.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_accepts_matching_blob() {
        let blob = b"package contents";
        let mut meta = crate::store::tests::meta("app", "1.0", "main");
        meta.checksum = sha256_hex(blob);

        assert!(ChecksumVerifier.verify(&meta, blob).is_ok());
    }

    #[test]
    fn test_checksum_rejects_tampered_blob() {
        let mut meta = crate::store::tests::meta("app", "1.0", "main");
        meta.checksum = sha256_hex(b"original contents");

        let err = ChecksumVerifier.verify(&meta, b"tampered contents").unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
