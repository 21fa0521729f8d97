use reqsync_types::ContentHash;

/// Domain-separated BLAKE3 hasher.
///
/// The domain tag is hashed ahead of the payload, so a blob and a commit
/// with identical bytes never share an address.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for document blobs.
    pub const BLOB: Self = Self {
        domain: "reqsync-blob-v1",
    };
    /// Hasher for commit records.
    pub const COMMIT: Self = Self {
        domain: "reqsync-commit-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    pub fn hash(&self, data: &[u8]) -> ContentHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        ContentHash::from_digest(*hasher.finalize().as_bytes())
    }

    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domains_separate_hashes() {
        let data = b"same content";
        assert_ne!(ContentHasher::BLOB.hash(data), ContentHasher::COMMIT.hash(data));
        assert_ne!(ContentHasher::BLOB.hash(data), ContentHash::of(data));
    }

    #[test]
    fn verify_detects_tampering() {
        let hash = ContentHasher::BLOB.hash(b"original");
        assert!(ContentHasher::BLOB.verify(b"original", &hash));
        assert!(!ContentHasher::BLOB.verify(b"tampered", &hash));
    }

    #[test]
    fn custom_domain() {
        let hasher = ContentHasher::new("reqsync-test-v1");
        assert_eq!(hasher.domain(), "reqsync-test-v1");
        assert_ne!(hasher.hash(b"x"), ContentHasher::BLOB.hash(b"x"));
    }
}
