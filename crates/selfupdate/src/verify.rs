//! Content digest verification.
//!
//! Staged files are hashed with SHA-256 and compared against the digest
//! written in the manifest. Comparison ignores hex case and runs in constant
//! time over the normalized strings.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::UpdateError;

/// Buffer size for reading files during hash computation.
const HASH_BUFFER_SIZE: usize = 8192;

/// Computes and checks content digests of staged files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestVerifier;

impl DigestVerifier {
    /// Create a new digest verifier.
    pub fn new() -> Self {
        Self
    }

    /// Compute the lowercase hex SHA-256 digest of a file.
    ///
    /// Reads the file in chunks so large artifacts are never loaded whole.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    pub fn digest_file(&self, path: &Path) -> Result<String, UpdateError> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; HASH_BUFFER_SIZE];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(hex::encode(hasher.finalize()))
    }

    /// Compare two hex digests, ignoring case.
    pub fn digests_match(&self, expected: &str, actual: &str) -> bool {
        let expected = expected.trim().to_ascii_lowercase();
        let actual = actual.trim().to_ascii_lowercase();
        expected.as_bytes().ct_eq(actual.as_bytes()).into()
    }

    /// Verify that a file's digest matches `expected`.
    ///
    /// # Errors
    ///
    /// Returns `UpdateError::DigestMismatch` if the digests differ, or an IO
    /// error if the file cannot be read.
    pub fn verify(&self, path: &Path, expected: &str) -> Result<(), UpdateError> {
        let actual = self.digest_file(path)?;

        if !self.digests_match(expected, &actual) {
            tracing::error!(
                expected = %expected,
                actual = %actual,
                path = %path.display(),
                "Digest mismatch"
            );
            return Err(UpdateError::DigestMismatch {
                expected: expected.to_string(),
                actual,
            });
        }

        tracing::debug!(digest = %actual, path = %path.display(), "Digest verified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_file(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_digest_empty_file() {
        let file = create_test_file(b"");
        let digest = DigestVerifier::new().digest_file(file.path()).unwrap();

        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_larger_than_buffer() {
        let content: Vec<u8> = (0..20000).map(|i| (i % 256) as u8).collect();
        let file = create_test_file(&content);

        let digest = DigestVerifier::new().digest_file(file.path()).unwrap();

        assert_eq!(digest, hex::encode(Sha256::digest(&content)));
    }

    #[test]
    fn test_digest_nonexistent_file() {
        let result = DigestVerifier::new().digest_file(Path::new("/nonexistent/file.bin"));

        assert!(matches!(result, Err(UpdateError::IoError(_))));
    }

    #[test]
    fn test_digests_match_ignores_case() {
        let verifier = DigestVerifier::new();

        assert!(verifier.digests_match("AA11", "aa11"));
        assert!(verifier.digests_match("aa11", "AA11"));
        assert!(!verifier.digests_match("AA11", "cc33"));
        assert!(!verifier.digests_match("AA11", "aa11aa11"));
    }

    #[test]
    fn test_verify_uppercase_manifest_digest() {
        let file = create_test_file(b"payload");
        let expected = hex::encode(Sha256::digest(b"payload")).to_uppercase();

        assert!(DigestVerifier::new().verify(file.path(), &expected).is_ok());
    }

    #[test]
    fn test_verify_mismatch() {
        let file = create_test_file(b"payload");

        match DigestVerifier::new().verify(file.path(), "cc33") {
            Err(UpdateError::DigestMismatch { expected, actual }) => {
                assert_eq!(expected, "cc33");
                assert_eq!(actual, hex::encode(Sha256::digest(b"payload")));
            }
            other => panic!("Expected DigestMismatch, got {:?}", other),
        }
    }
}
