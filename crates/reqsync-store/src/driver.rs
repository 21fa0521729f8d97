use crate::error::StoreResult;

/// Byte-oriented key-value backend underneath the object store and the
/// metadata records.
///
/// Keys are `/`-separated relative paths such as `blobs/ab/cdef…` or
/// `projects/prj_1/branches/master.json`. Implementations must satisfy:
/// - A `write` followed by a `read` of the same key returns identical bytes.
/// - `delete` of a missing key succeeds and reports `false`.
/// - `list` returns every key starting with `prefix`, sorted ascending.
/// - All I/O errors are propagated.
pub trait Driver: Send + Sync {
    /// Read the value at `key`, or `None` when absent.
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write `value` at `key`, replacing any previous value.
    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Delete `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Sorted keys beginning with `prefix`.
    fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Whether `key` holds a value.
    ///
    /// Default implementation reads the value. Backends may override with a
    /// cheaper existence check.
    fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read(key)?.is_some())
    }
}

/// Reject keys that could escape a driver's namespace.
pub fn validate_key(key: &str) -> StoreResult<()> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|part| part.is_empty() || part == "." || part == "..");
    if bad {
        return Err(crate::error::StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
