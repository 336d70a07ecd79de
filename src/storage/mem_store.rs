/// Backing store kept entirely in memory.


use crate::common::errors::Error;
use crate::storage::store::BackingStore;
use std::sync::Mutex;


/// In-memory byte array growing on demand, behaves like a sparse file.
pub struct MemStore {
    data: Mutex<Vec<u8>>,
}

impl MemStore {

    pub fn new() -> Self {
        MemStore {
            data: Mutex::new(Vec::new()),
        }
    }

    /// Number of bytes written so far, including holes.
    pub fn len(&self) -> Result<u64, Error> {
        let data = self.data.lock().map_err(|_| Error::lock_error())?;
        Ok(data.len() as u64)
    }
}

impl BackingStore for MemStore {

    fn read(&self, offset: u64, count: u64) -> Result<Vec<u8>, Error> {
        let data = self.data.lock().map_err(|_| Error::lock_error())?;

        let start = offset as usize;
        let end = start + count as usize;
        if end > data.len() {
            return Err(Error::storage_read_error(std::io::Error::new(std::io::ErrorKind::UnexpectedEof,
                format!("range {}..{} is beyond end of store ({})", start, end, data.len()))));
        }

        Ok(data[start..end].to_vec())
    }

    fn write(&self, offset: u64, buf: &[u8]) -> Result<(), Error> {
        let mut data = self.data.lock().map_err(|_| Error::lock_error())?;

        let start = offset as usize;
        let end = start + buf.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(buf);

        Ok(())
    }
}
