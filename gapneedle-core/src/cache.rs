use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::io::faidx::{FaidxError, IndexedFasta};

/// Indexed FASTA files opened during one session.
///
/// Keyed by canonical path so that `./a.fa` and `/abs/a.fa` share an entry.
/// Entries live until the cache is dropped or cleared; nothing is global, so
/// independent sessions never see each other's stale indexes.
#[derive(Debug, Default)]
pub struct FastaCache {
    stores: HashMap<PathBuf, Arc<IndexedFasta>>,
}

impl FastaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<Arc<IndexedFasta>, FaidxError> {
        let path = path.as_ref();
        let key = std::fs::canonicalize(path).map_err(|source| FaidxError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(store) = self.stores.get(&key) {
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(IndexedFasta::open(&key)?);
        self.stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        std::fs::canonicalize(path)
            .map(|key| self.stores.contains_key(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn clear(&mut self) {
        self.stores.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_same_file_shares_one_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.fa");
        std::fs::write(&path, ">s\nACGT\n").unwrap();
        let dotted = dir.path().join(".").join("a.fa");

        let mut cache = FastaCache::new();
        let first = cache.open(&path).unwrap();
        let second = cache.open(&dotted).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&dotted));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let mut cache = FastaCache::new();
        assert!(matches!(cache.open("/no/such.fa"), Err(FaidxError::Open { .. })));
        assert!(cache.is_empty());
    }
}
