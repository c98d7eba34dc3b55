//! Filesystem bitmap cache.
//!
//! Rendered cards are stored as one file per page id under a fixed
//! directory. The page id is the sole identity: titles are display data and
//! never participate in the path, so an entry may predate a title change.
//! There is no TTL, size bound, or invalidation hook; entries live until
//! removed outside this process.

use std::fs;
use std::path::PathBuf;

use crate::{BitmapFormat, Error, Result};

/// Bitmap store keyed by page id.
pub struct CardCache {
    dir: PathBuf,
    extension: &'static str,
}

impl CardCache {
    /// Create a store rooted at `dir`; files carry the extension of `format`.
    pub fn new(dir: impl Into<PathBuf>, format: BitmapFormat) -> Self {
        Self {
            dir: dir.into(),
            extension: format.extension(),
        }
    }

    /// Path of the entry for `page_id`, whether or not it exists.
    pub fn entry_path(&self, page_id: u64) -> PathBuf {
        self.dir.join(format!("{}.{}", page_id, self.extension))
    }

    /// True iff a bitmap is stored for `page_id`.
    pub fn has(&self, page_id: u64) -> bool {
        self.entry_path(page_id).is_file()
    }

    /// Read the stored bitmap.
    pub fn get(&self, page_id: u64) -> Result<Vec<u8>> {
        let path = self.entry_path(page_id);
        fs::read(&path)
            .map_err(|e| Error::CacheIo(format!("Cannot read {}: {}", path.display(), e)))
    }

    /// Write or overwrite the stored bitmap.
    pub fn put(&self, page_id: u64, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| Error::CacheIo(format!("Cannot create {}: {}", self.dir.display(), e)))?;

        let path = self.entry_path(page_id);
        fs::write(&path, bytes)
            .map_err(|e| Error::CacheIo(format!("Cannot write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CardCache::new(dir.path(), BitmapFormat::Webp);

        assert!(!cache.has(7));
        assert!(cache.get(7).is_err());

        cache.put(7, b"first").unwrap();
        assert!(cache.has(7));
        assert_eq!(cache.get(7).unwrap(), b"first");

        cache.put(7, b"second").unwrap();
        assert_eq!(cache.get(7).unwrap(), b"second");
    }

    #[test]
    fn test_path_derived_from_page_id_only() {
        let cache = CardCache::new("out", BitmapFormat::Webp);
        assert_eq!(cache.entry_path(4242), PathBuf::from("out/4242.webp"));
    }

    #[test]
    fn test_put_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("cards");
        let cache = CardCache::new(&nested, BitmapFormat::Png);

        cache.put(1, b"png").unwrap();
        assert!(nested.join("1.png").is_file());
    }
}
