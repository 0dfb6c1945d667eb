//! Content fingerprints used to detect source changes without re-parsing.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 digest (hex) of a byte buffer plus its length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint {
    pub digest: String,
    pub len: u64,
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = {
            let mut h = Sha256::new();
            h.update(bytes);
            hex::encode(h.finalize())
        };
        Fingerprint {
            digest,
            len: bytes.len() as u64,
        }
    }

    /// First 12 hex chars, for log lines and the error page.
    pub fn short(&self) -> &str {
        &self.digest[..12.min(self.digest.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.short(), self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_bytes_share_fingerprint() {
        assert_eq!(Fingerprint::of(b"name: a\n"), Fingerprint::of(b"name: a\n"));
    }

    #[test]
    fn single_byte_edit_changes_fingerprint() {
        assert_ne!(Fingerprint::of(b"name: a\n"), Fingerprint::of(b"name: b\n"));
    }

    #[test]
    fn empty_input_has_zero_len() {
        let fp = Fingerprint::of(b"");
        assert_eq!(fp.len, 0);
        assert_eq!(
            fp.digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(fp.short(), "e3b0c44298fc");
    }
}
