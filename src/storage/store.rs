//! Backing store keeps serialized blocks in a single file.
//!
//! The store is a plain byte-addressed file: it knows nothing about blocks, it only reads and
//! writes byte ranges handed out by the free space allocator. Once `write` returns the data is
//! considered durable.
//!
//! The file is locked exclusively while the store is open, so two processes can't write to the
//! same file concurrently.


use crate::common::errors::Error;
use crate::system::config::ConfigMt;
use std::fs::File;
use std::io::{Read, Write, Seek, SeekFrom};
use std::sync::Mutex;
use fs2::FileExt;
use log::warn;


/// Byte-level access to the persistent file.
pub trait BackingStore: Send + Sync {

    /// Read `count` bytes starting at `offset`.
    fn read(&self, offset: u64, count: u64) -> Result<Vec<u8>, Error>;

    /// Write `data` starting at `offset`.
    fn write(&self, offset: u64, data: &[u8]) -> Result<(), Error>;
}


/// Backing store on top of a regular file.
pub struct FileStore {
    file:   Mutex<File>,
    path:   String,
}

impl FileStore {

    /// Open file at path specified in configuration, create it if it does not exist.
    pub fn from_conf(conf: &ConfigMt) -> Result<Self, Error> {
        let path = conf.get_conf()?.get_store_path().clone();
        Self::open(&path)
    }

    /// Open file, create it if it does not exist.
    pub fn open(path: &str) -> Result<Self, Error> {
        let f = std::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?;

        f.try_lock_exclusive()?;

        Ok(FileStore {
            file: Mutex::new(f),
            path: path.to_owned(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Current size of the file on disk.
    pub fn file_size(&self) -> Result<u64, Error> {
        let f = self.file.lock().map_err(|_| Error::lock_error())?;
        Ok(f.metadata()?.len())
    }
}

impl BackingStore for FileStore {

    fn read(&self, offset: u64, count: u64) -> Result<Vec<u8>, Error> {
        let mut f = self.file.lock().map_err(|_| Error::lock_error())?;

        let mut buf = vec![0u8; count as usize];
        f.seek(SeekFrom::Start(offset)).map_err(Error::storage_read_error)?;
        f.read_exact(&mut buf).map_err(Error::storage_read_error)?;

        Ok(buf)
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), Error> {
        let mut f = self.file.lock().map_err(|_| Error::lock_error())?;

        f.seek(SeekFrom::Start(offset)).map_err(Error::storage_write_error)?;
        f.write_all(data).map_err(Error::storage_write_error)?;

        Ok(())
    }
}

impl Drop for FileStore {

    fn drop(&mut self) {
        match self.file.lock() {
            Ok(f) => {
                if let Err(e) = f.sync_all() {
                    warn!("Error while syncing backing store file {}: {}", self.path, e);
                }
                if let Err(e) = f.unlock() {
                    warn!("Error while unlocking backing store file {}: {}", self.path, e);
                }
            },
            Err(_) => warn!("Backing store file {} lock is poisoned", self.path),
        }
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::errors::ErrorKind;
    use std::path::Path;

    #[test]
    fn test_file_store() {
        let path = "/tmp/test_diskbuf_file_store_3390127.dat";
        if Path::new(path).exists() {
            std::fs::remove_file(path).expect("Failed to delete test file on cleanup");
        }

        let store = FileStore::open(path).expect("Failed to open store");
        assert_eq!(store.path(), path);
        assert_eq!(store.file_size().unwrap(), 0);

        store.write(10, &[1, 2, 3, 4]).expect("Failed to write");
        store.write(0, &[9; 10]).expect("Failed to write");
        assert_eq!(store.file_size().unwrap(), 14);

        assert_eq!(store.read(8, 4).unwrap(), vec![9, 9, 1, 2]);
        assert_eq!(store.read(10, 4).unwrap(), vec![1, 2, 3, 4]);

        let err = store.read(12, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageReadError);

        // the file is locked while the store is open
        assert!(FileStore::open(path).is_err());
        drop(store);

        let conf = ConfigMt::new();
        conf.get_conf().unwrap().set_store_path(path.to_owned());
        let store = FileStore::from_conf(&conf).expect("Failed to reopen store");
        assert_eq!(store.read(0, 14).unwrap(), vec![9, 9, 9, 9, 9, 9, 9, 9, 9, 9, 1, 2, 3, 4]);
        drop(store);

        std::fs::remove_file(path).expect("Failed to delete test file on cleanup");
    }
}
