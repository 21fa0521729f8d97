use std::sync::Arc;

use tracing::debug;

use reqsync_types::ContentHash;

use crate::driver::Driver;
use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;
use crate::object::{DeltaObject, ObjectKind, StoredObject};
use crate::options::StoreOptions;

const BLOB_PREFIX: &str = "blobs/";
const COMMIT_PREFIX: &str = "commits/";

/// Content-addressed store for document blobs and commit records.
///
/// Objects are immutable once written and keyed by their domain-separated
/// hash, so writes are idempotent and the store can be shared freely
/// between version-control instances.
#[derive(Clone)]
pub struct ObjectStore {
    driver: Arc<dyn Driver>,
    options: StoreOptions,
}

impl ObjectStore {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self::with_options(driver, StoreOptions::default())
    }

    pub fn with_options(driver: Arc<dyn Driver>, options: StoreOptions) -> Self {
        Self { driver, options }
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    fn compression(&self) -> Option<i32> {
        self.options
            .compression
            .then_some(self.options.compression_level)
    }

    // -----------------------------------------------------------------------
    // Blobs
    // -----------------------------------------------------------------------

    /// Store `data` in full and return its address. No-op if already present.
    pub fn put_blob(&self, data: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHasher::BLOB.hash(data);
        let key = blob_key(&hash);
        if self.driver.exists(&key)? {
            return Ok(hash);
        }
        self.write_object(&key, ObjectKind::Blob, data.to_vec())?;
        debug!(hash = %hash.short(), bytes = data.len(), "stored blob");
        Ok(hash)
    }

    /// Store `data`, as a delta against `base` when that is smaller than the
    /// full content.
    ///
    /// Falls back to full storage when the base is missing or already sits at
    /// the end of a maximal delta chain.
    pub fn put_blob_delta(&self, data: &[u8], base: &ContentHash) -> StoreResult<ContentHash> {
        let hash = ContentHasher::BLOB.hash(data);
        let key = blob_key(&hash);
        if self.driver.exists(&key)? {
            return Ok(hash);
        }
        if hash == *base || !self.has_blob(base)? {
            return self.put_blob(data);
        }

        let (base_data, depth) = self.resolve(base)?;
        if depth >= self.options.max_delta_chain {
            debug!(hash = %hash.short(), depth, "delta chain full, storing blob in full");
            return self.put_blob(data);
        }

        let script = reqsync_delta::diff(&base_data, data, self.options.delta_chunk_size)?;
        let payload = DeltaObject {
            base: *base,
            script,
        }
        .to_bytes()?;
        if payload.len() >= data.len() {
            debug!(
                hash = %hash.short(),
                delta = payload.len(),
                full = data.len(),
                "delta not smaller, storing blob in full"
            );
            return self.put_blob(data);
        }

        self.write_object(&key, ObjectKind::Delta, payload)?;
        debug!(hash = %hash.short(), base = %base.short(), depth = depth + 1, "stored blob as delta");
        Ok(hash)
    }

    /// Read a blob, resolving delta chains and verifying the result.
    pub fn get_blob(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        self.resolve(hash).map(|(data, _)| data)
    }

    pub fn has_blob(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.driver.exists(&blob_key(hash))
    }

    /// Remove a blob. Returns `true` if it existed.
    ///
    /// Only safe for blobs no commit and no delta references.
    pub fn delete_blob(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.driver.delete(&blob_key(hash))
    }

    /// Every stored blob address, sorted.
    pub fn list_blobs(&self) -> StoreResult<Vec<ContentHash>> {
        list_hashes(self.driver.as_ref(), BLOB_PREFIX)
    }

    /// Whether the blob is stored as a delta rather than in full.
    pub fn is_delta(&self, hash: &ContentHash) -> StoreResult<bool> {
        let key = blob_key(hash);
        let obj = self.read_object(&key)?.ok_or(StoreError::NotFound(*hash))?;
        Ok(obj.kind == ObjectKind::Delta)
    }

    /// Content and delta-chain depth of a blob (0 for a full blob).
    fn resolve(&self, hash: &ContentHash) -> StoreResult<(Vec<u8>, usize)> {
        let mut chain = Vec::new();
        let mut current = *hash;
        let mut data = loop {
            let key = blob_key(&current);
            let obj = self
                .read_object(&key)?
                .ok_or(StoreError::NotFound(current))?;
            match obj.kind {
                ObjectKind::Blob => break obj.data,
                ObjectKind::Delta => {
                    if chain.len() >= self.options.max_delta_chain {
                        return Err(StoreError::DeltaChainTooDeep {
                            hash: *hash,
                            max: self.options.max_delta_chain,
                        });
                    }
                    let delta = DeltaObject::from_bytes(&key, &obj.data)?;
                    current = delta.base;
                    chain.push((key, delta.script));
                }
                ObjectKind::Commit => {
                    return Err(StoreError::CorruptObject {
                        key,
                        reason: "expected blob, got commit".into(),
                    })
                }
            }
        };
        verify(&ContentHasher::BLOB, &current, &data)?;

        let depth = chain.len();
        for (_, script) in chain.iter().rev() {
            data = reqsync_delta::patch(&data, script)?;
        }
        verify(&ContentHasher::BLOB, hash, &data)?;
        Ok((data, depth))
    }

    // -----------------------------------------------------------------------
    // Commits
    // -----------------------------------------------------------------------

    /// Store a serialized commit record and return its address.
    pub fn put_commit(&self, record: &[u8]) -> StoreResult<ContentHash> {
        let hash = ContentHasher::COMMIT.hash(record);
        let key = commit_key(&hash);
        if !self.driver.exists(&key)? {
            self.write_object(&key, ObjectKind::Commit, record.to_vec())?;
            debug!(hash = %hash.short(), "stored commit");
        }
        Ok(hash)
    }

    /// Read and verify a commit record.
    pub fn get_commit(&self, hash: &ContentHash) -> StoreResult<Vec<u8>> {
        let key = commit_key(hash);
        let obj = self
            .read_object(&key)?
            .ok_or(StoreError::NotFound(*hash))?
            .expect_kind(&key, ObjectKind::Commit)?;
        verify(&ContentHasher::COMMIT, hash, &obj.data)?;
        Ok(obj.data)
    }

    pub fn has_commit(&self, hash: &ContentHash) -> StoreResult<bool> {
        self.driver.exists(&commit_key(hash))
    }

    pub fn list_commits(&self) -> StoreResult<Vec<ContentHash>> {
        list_hashes(self.driver.as_ref(), COMMIT_PREFIX)
    }

    // -----------------------------------------------------------------------
    // Framing
    // -----------------------------------------------------------------------

    fn write_object(&self, key: &str, kind: ObjectKind, data: Vec<u8>) -> StoreResult<()> {
        let frame = StoredObject::new(kind, data).encode(self.compression())?;
        self.driver.write(key, &frame)
    }

    fn read_object(&self, key: &str) -> StoreResult<Option<StoredObject>> {
        match self.driver.read(key)? {
            Some(frame) => StoredObject::decode(key, &frame).map(Some),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn verify(hasher: &ContentHasher, expected: &ContentHash, data: &[u8]) -> StoreResult<()> {
    let computed = hasher.hash(data);
    if computed != *expected {
        return Err(StoreError::HashMismatch {
            expected: *expected,
            computed,
        });
    }
    Ok(())
}

/// Fan out by the first byte to keep directories small on disk.
fn object_key(prefix: &str, hash: &ContentHash) -> String {
    let hex = hash.to_hex();
    format!("{prefix}{}/{}", &hex[..2], &hex[2..])
}

fn blob_key(hash: &ContentHash) -> String {
    object_key(BLOB_PREFIX, hash)
}

fn commit_key(hash: &ContentHash) -> String {
    object_key(COMMIT_PREFIX, hash)
}

fn list_hashes(driver: &dyn Driver, prefix: &str) -> StoreResult<Vec<ContentHash>> {
    let mut hashes = Vec::new();
    for key in driver.list(prefix)? {
        let hex: String = key[prefix.len()..].chars().filter(|c| *c != '/').collect();
        match ContentHash::from_hex(&hex) {
            Ok(hash) => hashes.push(hash),
            Err(_) => debug!(key, "skipping non-object key"),
        }
    }
    hashes.sort();
    Ok(hashes)
}
