//! Optimized storage layer using RocksDB

use crate::config::{CompressionType, StorageConfig};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct OptimizedStorage {
    db: Arc<DB>,
}

impl OptimizedStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, rocksdb::Error> {
        Self::open(path.as_ref(), &StorageConfig::default())
    }

    /// Open using the tuning in `config`, wiping the directory first when
    /// `clear_on_start` is set
    pub fn new_with_config(config: &StorageConfig) -> Result<Self, rocksdb::Error> {
        let path = Path::new(&config.data_directory);
        if config.clear_on_start && path.exists() {
            DB::destroy(&Options::default(), path)?;
        }
        Self::open(path, config)
    }

    fn open(path: &Path, config: &StorageConfig) -> Result<Self, rocksdb::Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size_mb * 1024 * 1024);
        opts.set_max_write_buffer_number(config.max_write_buffer_number as i32);
        opts.set_compression_type(match config.compression_type {
            CompressionType::None => rocksdb::DBCompressionType::None,
            CompressionType::Snappy => rocksdb::DBCompressionType::Snappy,
            CompressionType::Lz4 => rocksdb::DBCompressionType::Lz4,
            CompressionType::Zstd => rocksdb::DBCompressionType::Zstd,
        });

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, rocksdb::Error> {
        self.db.get(key)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<(), rocksdb::Error> {
        self.db.put(key, value)
    }

    /// Write every item or none of them
    pub fn batch_write<K, V>(&self, items: &[(K, V)]) -> Result<(), rocksdb::Error>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        self.db.write(batch)
    }

    /// Up to `limit` rows under `prefix` in key order, starting strictly
    /// after `start_after` when given
    pub fn scan_prefix(
        &self,
        prefix: &[u8],
        start_after: Option<&[u8]>,
        limit: usize,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, rocksdb::Error> {
        let start = start_after.unwrap_or(prefix);
        let mut rows = Vec::with_capacity(limit.min(256));

        for item in self.db.iterator(IteratorMode::From(start, Direction::Forward)) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if start_after.is_some_and(|after| &*key == after) {
                continue;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_write_and_scan() {
        let dir = tempfile::tempdir().unwrap();
        let storage = OptimizedStorage::new(dir.path()).unwrap();

        storage
            .batch_write(&[
                (b"p:1".to_vec(), b"a".to_vec()),
                (b"p:2".to_vec(), b"b".to_vec()),
                (b"p:3".to_vec(), b"c".to_vec()),
                (b"q:1".to_vec(), b"z".to_vec()),
            ])
            .unwrap();

        let all = storage.scan_prefix(b"p:", None, 10).unwrap();
        assert_eq!(all.len(), 3);

        let after = storage.scan_prefix(b"p:", Some(b"p:1"), 10).unwrap();
        assert_eq!(after.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(), vec![b"p:2".to_vec(), b"p:3".to_vec()]);

        let limited = storage.scan_prefix(b"p:", None, 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(storage.get(b"q:1").unwrap(), Some(b"z".to_vec()));
    }
}
