/// Different reusable definitions


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};


/// File offset value of a block which was never written to the backing store.
pub const UNSET_OFFSET: u64 = u64::MAX;


/// Continuous range of bytes in the backing store.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct FileRange {
    pub offset: u64,
    pub length: u64,
}

impl FileRange {

    pub fn new(offset: u64, length: u64) -> Self {
        FileRange {
            offset,
            length,
        }
    }

    /// Offset of the first byte after the range.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }
}


/// Numeric sequence
#[derive(Clone)]
pub struct Sequence {
    sn: Arc<AtomicU64>,
}

impl Sequence {
    pub fn new(sn: u64) -> Self {
        Sequence {
            sn: Arc::new(AtomicU64::new(sn)),
        }
    }

    pub fn get_next(&self) -> u64 {
        self.sn.fetch_add(1, Ordering::Relaxed)
    }
}
