//! SHA-256 verification of downloaded artifacts.
//!
//! The verifier never deletes a failing file; removal on mismatch is the
//! orchestrator's policy, which keeps this module independently testable.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const BUF_SIZE: usize = 64 * 1024;

/// Digest mismatch between the expected value and the file on disk. The
/// artifact must not be kept as if it were valid.
#[derive(Debug, Error)]
#[error("checksum mismatch: expected {expected}, got {computed}")]
pub struct ChecksumMismatch {
    pub expected: String,
    pub computed: String,
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn sha256_path(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(hex::encode(digest))
}

/// Verify that the file's digest equals `expected` (case-insensitively).
/// A mismatch error names both digests for operator diagnosis.
pub fn verify(path: &Path, expected: &str) -> Result<()> {
    let computed = sha256_path(path)?;
    if !computed.eq_ignore_ascii_case(expected) {
        return Err(ChecksumMismatch {
            expected: expected.to_string(),
            computed,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";

    fn file_with(content: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = sha256_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn sha256_path_known_content() {
        let f = file_with(b"hello\n");
        assert_eq!(sha256_path(f.path()).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn verify_accepts_matching_digest_case_insensitively() {
        let f = file_with(b"hello\n");
        verify(f.path(), HELLO_SHA256).unwrap();
        verify(f.path(), &HELLO_SHA256.to_uppercase()).unwrap();
    }

    #[test]
    fn verify_mismatch_names_both_digests() {
        let f = file_with(b"hello\n");
        let expected = "a".repeat(64);
        let err = verify(f.path(), &expected).unwrap_err();
        let mismatch = err.downcast_ref::<ChecksumMismatch>().expect("mismatch");
        assert_eq!(mismatch.expected, expected);
        assert_eq!(mismatch.computed, HELLO_SHA256);
        let text = err.to_string();
        assert!(text.contains(&expected));
        assert!(text.contains(HELLO_SHA256));
    }

    #[test]
    fn single_byte_change_fails_with_different_computed_digest() {
        let f = file_with(b"Hello\n");
        let err = verify(f.path(), HELLO_SHA256).unwrap_err();
        let mismatch = err.downcast_ref::<ChecksumMismatch>().expect("mismatch");
        assert_ne!(mismatch.computed, HELLO_SHA256);
    }

    #[test]
    fn verify_missing_file_is_not_a_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify(&dir.path().join("absent"), HELLO_SHA256).unwrap_err();
        assert!(err.downcast_ref::<ChecksumMismatch>().is_none());
    }
}
