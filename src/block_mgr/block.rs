//! Saveable blocks.
//!
//! A block owns a payload which can be held in memory, written to the backing store, or both.
//! At any moment a block is in one of three states:
//!  - unsaved: block was never written, all its data (if any) is in memory;
//!  - dirty-buffered: block has data in memory which is not on disk yet, or was reloaded from
//!    disk, and it is registered in the buffer manager;
//!  - saved-clean: block data is on disk, nothing is held in memory.
//!
//! Data added to a saved block does not require reading the block back: new records are kept
//! in memory, and the on-disk part is merged in front of them only when the block is flushed
//! or read.
//!
//! Locking. Block data is protected by the block lock which is held for the whole flush,
//! including disk I/O. Buffer registration state (BufferSlot) has its own lock and is changed
//! only while the buffer manager registry lock is held. Block lock is never acquired while
//! registry lock is held.


use crate::common::errors::Error;
use crate::common::defs::FileRange;
use crate::common::defs::UNSET_OFFSET;
use crate::storage::store::BackingStore;
use crate::block_mgr::payload::Payload;
use crate::buf_mgr::buf_mgr::BufferManager;
use crate::buf_mgr::pending::BufferHandle;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use log::error;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BlockState {
    Unsaved,
    DirtyBuffered,
    SavedClean,
}


/// Location of block data in the backing store.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FilePosition {
    offset: u64,
    length: u64,
}

impl FilePosition {

    pub fn unset() -> Self {
        FilePosition {
            offset: UNSET_OFFSET,
            length: 0,
        }
    }

    pub fn new(range: FileRange) -> Self {
        FilePosition {
            offset: range.offset,
            length: range.length,
        }
    }

    pub fn is_set(&self) -> bool {
        self.offset != UNSET_OFFSET
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn length(&self) -> u64 {
        self.length
    }

    pub fn range(&self) -> Option<FileRange> {
        if self.is_set() {
            Some(FileRange::new(self.offset, self.length))
        } else {
            None
        }
    }

    /// Point to a new range, return the previous one.
    pub fn set(&mut self, range: FileRange) -> Option<FileRange> {
        let prev = self.range();
        self.offset = range.offset;
        self.length = range.length;
        prev
    }

    /// Reset to unset state, return the previous range.
    pub fn take(&mut self) -> Option<FileRange> {
        let prev = self.range();
        *self = Self::unset();
        prev
    }
}


/// Memory used by a block as seen at some moment.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Footprint {
    pub bytes:      u64,
    pub epoch:      u64,    // number of times block data was released to disk before
    pub resident:   bool,   // block holds data in memory which must be flushed or released
}


/// Result of a flush attempt.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FlushOutcome {
    /// Nothing was held in memory.
    Idle,
    /// Unchanged data was dropped from memory, on-disk copy is kept.
    Released,
    /// All data was removed; prior on-disk range is not used anymore.
    Emptied { prior: Option<FileRange> },
    /// Data does not fit into the target range, nothing was written.
    Outgrown { needed: u64 },
    /// Data was written to range (which can be shorter than the target); prior range is not used anymore.
    Written { range: FileRange, prior: Option<FileRange> },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FlushReport {
    pub outcome:    FlushOutcome,
    pub epoch:      u64,    // block epoch after the flush
}


/// Registration of a block in the buffer manager.
#[derive(Default, Debug)]
pub struct BufferSlot {
    handle:     Option<BufferHandle>,
    footprint:  u64,
    epoch:      u64,
    settled:    u64,
}

impl BufferSlot {

    pub fn handle(&self) -> Option<BufferHandle> {
        self.handle
    }

    pub fn footprint(&self) -> u64 {
        self.footprint
    }

    /// Footprint observed before the last registered flush, or older than the current
    /// registration, must be ignored.
    pub fn accepts(&self, fp: &Footprint) -> bool {
        fp.epoch >= self.settled && (self.handle.is_none() || fp.epoch >= self.epoch)
    }

    fn register(&mut self, handle: BufferHandle, fp: &Footprint) -> u64 {
        let prev = if self.handle.is_some() { self.footprint } else { 0 };
        self.handle = Some(handle);
        self.footprint = fp.bytes;
        self.epoch = fp.epoch;
        prev
    }

    fn forget(&mut self) -> Option<(BufferHandle, u64)> {
        let footprint = std::mem::replace(&mut self.footprint, 0);
        self.handle.take().map(|h| (h, footprint))
    }

    fn settle(&mut self, epoch: u64) -> Option<(BufferHandle, u64)> {
        if epoch > self.settled {
            self.settled = epoch;
        }

        if self.handle.is_some() && self.epoch < epoch {
            self.forget()
        } else {
            None
        }
    }
}


/// Saveable contract used by the buffer manager.
pub trait Saveable: Send + Sync {

    /// Unique block id.
    fn id(&self) -> u64;

    /// Memory currently used by the block payload; never does I/O.
    fn current_memory_footprint(&self) -> Result<Footprint, Error>;

    /// Number of bytes to allocate for the next flush, None if nothing has to be written.
    fn flush_len(&self) -> Result<Option<u64>, Error>;

    /// Write block data to target range (merging prior on-disk data in if needed), and
    /// release the payload. If writing fails the prior on-disk state is kept and the data
    /// remains in memory.
    fn flush_to(&self, target: Option<FileRange>) -> Result<FlushReport, Error>;

    /// Range occupied by block data in the backing store.
    fn file_range(&self) -> Result<Option<FileRange>, Error>;

    fn buffer_slot(&self) -> &Mutex<BufferSlot>;

    fn lock_buffer_slot(&self) -> Result<MutexGuard<BufferSlot>, Error> {
        self.buffer_slot().lock().map_err(|_| Error::lock_error())
    }

    fn buffer_handle(&self) -> Result<Option<BufferHandle>, Error> {
        Ok(self.lock_buffer_slot()?.handle())
    }

    /// Record registry handle and footprint, return previously registered footprint.
    fn register_with_buffer(&self, handle: BufferHandle, fp: &Footprint) -> Result<u64, Error> {
        Ok(self.lock_buffer_slot()?.register(handle, fp))
    }

    /// Drop registration, return the handle and the footprint which were registered.
    fn forget_buffer_registration(&self) -> Result<Option<(BufferHandle, u64)>, Error> {
        Ok(self.lock_buffer_slot()?.forget())
    }

    /// Account for flush which left block at epoch; return registration to drop if it was
    /// made before the flush.
    fn settle_buffer_registration(&self, epoch: u64) -> Result<Option<(BufferHandle, u64)>, Error> {
        Ok(self.lock_buffer_slot()?.settle(epoch))
    }
}


struct BlockData<P> {
    payload:    P,
    position:   FilePosition,
    loaded:     bool,   // payload includes data stored at position
    changed:    bool,   // payload differs from what is stored at position
    epoch:      u64,
}

impl<P: Payload> BlockData<P> {

    fn is_resident(&self) -> bool {
        self.changed || !self.payload.is_empty()
    }

    fn total_len(&self) -> u64 {
        if self.loaded || !self.position.is_set() {
            self.payload.encoded_len()
        } else {
            self.position.length() + self.payload.encoded_len()
        }
    }

    fn release(&mut self) {
        self.payload.clear();
        self.loaded = false;
        self.changed = false;
        self.epoch += 1;
    }
}


/// Block with payload of type P.
pub struct SaveableBlock<P: Payload> {
    id:         u64,
    data:       Mutex<BlockData<P>>,
    slot:       Mutex<BufferSlot>,
    store:      Arc<dyn BackingStore>,
    buf_mgr:    Arc<BufferManager>,
}

impl<P: Payload> SaveableBlock<P> {

    pub(crate) fn new(id: u64, position: FilePosition, store: Arc<dyn BackingStore>, buf_mgr: Arc<BufferManager>) -> Self {
        SaveableBlock {
            id,
            data: Mutex::new(BlockData {
                payload: P::default(),
                position,
                loaded: false,
                changed: false,
                epoch: 0,
            }),
            slot: Mutex::new(BufferSlot::default()),
            store,
            buf_mgr,
        }
    }

    /// Change payload without loading data from disk, e.g. to add new records.
    pub fn modify<F, R>(self: &Arc<Self>, f: F) -> Result<R, Error>
        where F: FnOnce(&mut P) -> R
    {
        let mut data = self.lock_data()?;
        let ret = f(&mut data.payload);
        data.changed = true;
        drop(data);

        self.buf_mgr.mark_dirty(self)?;

        Ok(ret)
    }

    /// Load data from disk if needed and change the whole payload.
    pub fn modify_loaded<F, R>(self: &Arc<Self>, f: F) -> Result<R, Error>
        where F: FnOnce(&mut P) -> R
    {
        let mut data = self.lock_data()?;
        self.load_locked(&mut data)?;
        let ret = f(&mut data.payload);
        data.changed = true;
        drop(data);

        self.buf_mgr.mark_dirty(self)?;

        Ok(ret)
    }

    /// Load data from disk if needed and read the whole payload.
    pub fn read<F, R>(self: &Arc<Self>, f: F) -> Result<R, Error>
        where F: FnOnce(&P) -> R
    {
        let mut data = self.lock_data()?;
        let loaded = self.load_locked(&mut data)?;
        let ret = f(&data.payload);
        drop(data);

        if loaded {
            self.buf_mgr.mark_dirty(self)?;
        }

        Ok(ret)
    }

    /// Bring on-disk data into memory.
    pub fn load(self: &Arc<Self>) -> Result<(), Error> {
        let mut data = self.lock_data()?;
        let loaded = self.load_locked(&mut data)?;
        drop(data);

        if loaded {
            self.buf_mgr.mark_dirty(self)?;
        }

        Ok(())
    }

    pub fn state(&self) -> Result<BlockState, Error> {
        let data = self.lock_data()?;
        let registered = self.lock_buffer_slot()?.handle().is_some();

        Ok(if registered {
            BlockState::DirtyBuffered
        } else if !data.position.is_set() {
            BlockState::Unsaved
        } else if data.is_resident() {
            BlockState::DirtyBuffered
        } else {
            BlockState::SavedClean
        })
    }

    /// Serialized size of all block data, on disk and in memory.
    pub fn total_len(&self) -> Result<u64, Error> {
        Ok(self.lock_data()?.total_len())
    }

    pub fn is_loaded(&self) -> Result<bool, Error> {
        Ok(self.lock_data()?.loaded)
    }

    pub fn is_changed(&self) -> Result<bool, Error> {
        Ok(self.lock_data()?.changed)
    }

    fn lock_data(&self) -> Result<MutexGuard<BlockData<P>>, Error> {
        self.data.lock().map_err(|_| Error::lock_error())
    }

    // merge on-disk data in front of in-memory data; return true if anything was read.
    fn load_locked(&self, data: &mut BlockData<P>) -> Result<bool, Error> {
        if data.loaded {
            return Ok(false);
        }

        let ret = if let Some(range) = data.position.range() {
            let bytes = self.store.read(range.offset, range.length)?;
            let mut merged = P::decode(&bytes)?;
            merged.append(std::mem::take(&mut data.payload));
            data.payload = merged;
            true
        } else {
            false
        };

        data.loaded = true;

        Ok(ret)
    }
}

impl<P: Payload> Saveable for SaveableBlock<P> {

    fn id(&self) -> u64 {
        self.id
    }

    fn current_memory_footprint(&self) -> Result<Footprint, Error> {
        let data = self.lock_data()?;
        Ok(Footprint {
            bytes: data.payload.memory_footprint(),
            epoch: data.epoch,
            resident: data.is_resident(),
        })
    }

    fn flush_len(&self) -> Result<Option<u64>, Error> {
        let data = self.lock_data()?;
        if !data.changed {
            return Ok(None);
        }

        let len = data.total_len();
        Ok(if len > 0 { Some(len) } else { None })
    }

    fn flush_to(&self, target: Option<FileRange>) -> Result<FlushReport, Error> {
        let mut data = self.lock_data()?;

        if !data.is_resident() {
            return Ok(FlushReport { outcome: FlushOutcome::Idle, epoch: data.epoch });
        }

        if !data.changed {
            data.release();
            return Ok(FlushReport { outcome: FlushOutcome::Released, epoch: data.epoch });
        }

        let needed = data.total_len();
        if needed == 0 {
            let prior = data.position.take();
            data.release();
            return Ok(FlushReport { outcome: FlushOutcome::Emptied { prior }, epoch: data.epoch });
        }

        let target = match target {
            Some(t) if t.length >= needed => t,
            _ => return Ok(FlushReport { outcome: FlushOutcome::Outgrown { needed }, epoch: data.epoch }),
        };

        self.load_locked(&mut data)?;

        let mut buf = Vec::with_capacity(needed as usize);
        data.payload.encode(&mut buf);
        debug_assert_eq!(buf.len() as u64, needed);

        self.store.write(target.offset, &buf)?;

        let range = FileRange::new(target.offset, buf.len() as u64);
        let prior = data.position.set(range);
        data.release();

        Ok(FlushReport { outcome: FlushOutcome::Written { range, prior }, epoch: data.epoch })
    }

    fn file_range(&self) -> Result<Option<FileRange>, Error> {
        Ok(self.lock_data()?.position.range())
    }

    fn buffer_slot(&self) -> &Mutex<BufferSlot> {
        &self.slot
    }
}

impl<P: Payload> Drop for SaveableBlock<P> {

    fn drop(&mut self) {
        if let Err(e) = self.buf_mgr.object_deleted(&*self) {
            error!("Failed to release storage of block {}: {}", self.id, e);
        }
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::common::errors::ErrorKind;
    use crate::block_mgr::payload::EventList;
    use crate::block_mgr::payload::TofEvent;
    use crate::block_mgr::payload::VarRecords;
    use crate::storage::mem_store::MemStore;
    use crate::system::config::ConfigMt;
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;


    /// Store which can be told to fail reads or writes.
    struct FaultyStore {
        inner:          MemStore,
        fail_reads:     AtomicBool,
        fail_writes:    AtomicBool,
    }

    impl BackingStore for FaultyStore {

        fn read(&self, offset: u64, count: u64) -> Result<Vec<u8>, Error> {
            if self.fail_reads.load(Ordering::Relaxed) {
                return Err(Error::storage_read_error(std::io::Error::new(std::io::ErrorKind::Other, "read failure")));
            }
            self.inner.read(offset, count)
        }

        fn write(&self, offset: u64, data: &[u8]) -> Result<(), Error> {
            if self.fail_writes.load(Ordering::Relaxed) {
                return Err(Error::storage_write_error(std::io::Error::new(std::io::ErrorKind::Other, "write failure")));
            }
            self.inner.write(offset, data)
        }
    }

    fn init(threshold: i64) -> (Arc<FaultyStore>, Arc<BufferManager>) {
        let conf = ConfigMt::new();
        conf.get_conf().unwrap().set_write_buffer_size(threshold);
        let store = Arc::new(FaultyStore {
            inner: MemStore::new(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        });
        let buf_mgr = BufferManager::new(&conf, store.clone()).expect("Failed to create buffer manager");
        // ranges are written directly in these tests, mark the space they use as occupied
        buf_mgr.set_free_space(&[], 1000).expect("Failed to set free space");
        (store, buf_mgr)
    }

    fn tof(i: i64) -> TofEvent {
        TofEvent { tof: i as f64, pulse_time: i }
    }

    fn flush(block: &SaveableBlock<EventList<TofEvent>>, at: u64) -> FlushReport {
        let len = block.flush_len().unwrap().expect("Nothing to flush");
        block.flush_to(Some(FileRange::new(at, len))).expect("Failed to flush")
    }

    #[test]
    fn test_file_position() {
        let mut pos = FilePosition::unset();
        assert!(!pos.is_set());
        assert_eq!(pos.offset(), UNSET_OFFSET);
        assert!(pos.range().is_none());

        assert_eq!(pos.set(FileRange::new(10, 5)), None);
        assert_eq!(pos.set(FileRange::new(20, 8)), Some(FileRange::new(10, 5)));
        assert_eq!(pos.length(), 8);
        assert_eq!(pos.take(), Some(FileRange::new(20, 8)));
        assert!(!pos.is_set());
        assert!(FilePosition::new(FileRange::new(1, 2)).is_set());
    }

    #[test]
    fn test_buffer_slot() {
        let mut slot = BufferSlot::default();
        let mut list = crate::buf_mgr::pending::PendingList::new();
        let h = list.push_back(0u8);

        let fp = Footprint { bytes: 100, epoch: 0, resident: true };
        assert!(slot.accepts(&fp));
        assert_eq!(slot.register(h, &fp), 0);
        assert_eq!(slot.register(h, &Footprint { bytes: 150, ..fp }), 100);
        assert_eq!(slot.footprint(), 150);

        // flush left block at epoch 1, the registration from epoch 0 is dropped
        assert_eq!(slot.settle(1), Some((h, 150)));
        assert!(slot.handle().is_none());
        assert!(!slot.accepts(&fp));

        // registration made after the flush survives its settlement
        let fp1 = Footprint { bytes: 10, epoch: 1, resident: true };
        assert!(slot.accepts(&fp1));
        assert_eq!(slot.register(h, &fp1), 0);
        assert_eq!(slot.settle(1), None);

        // late footprint from before the flush does not replace the newer registration
        let fp2 = Footprint { bytes: 20, epoch: 2, resident: true };
        assert_eq!(slot.register(h, &fp2), 10);
        assert!(!slot.accepts(&Footprint { bytes: 5, epoch: 1, resident: true }));
        assert!(slot.accepts(&Footprint { bytes: 25, epoch: 2, resident: true }));
        assert_eq!(slot.forget(), Some((h, 20)));
        assert!(slot.accepts(&Footprint { bytes: 5, epoch: 1, resident: true }));
        assert_eq!(slot.register(h, &fp1), 0);
        assert_eq!(slot.forget(), Some((h, 10)));
        assert_eq!(slot.forget(), None);
    }

    #[test]
    fn test_state_transitions() {
        let (store, buf_mgr) = init(0);
        let block = buf_mgr.create_block::<EventList<TofEvent>>();

        assert_eq!(block.state().unwrap(), BlockState::Unsaved);
        assert_eq!(block.flush_to(None).unwrap().outcome, FlushOutcome::Idle);
        assert!(block.flush_len().unwrap().is_none());

        block.modify(|p| { p.push(tof(1)); p.push(tof(2)); }).unwrap();
        assert_eq!(block.state().unwrap(), BlockState::DirtyBuffered);
        assert_eq!(block.current_memory_footprint().unwrap().bytes, 2 * std::mem::size_of::<TofEvent>() as u64);
        assert_eq!(block.flush_len().unwrap(), Some(32));

        // target range too small
        let report = block.flush_to(Some(FileRange::new(0, 16))).unwrap();
        assert_eq!(report.outcome, FlushOutcome::Outgrown { needed: 32 });
        assert_eq!(report.epoch, 0);

        let report = flush(&block, 0);
        assert_eq!(report.outcome, FlushOutcome::Written { range: FileRange::new(0, 32), prior: None });
        assert_eq!(report.epoch, 1);
        assert_eq!(block.file_range().unwrap(), Some(FileRange::new(0, 32)));
        assert_eq!(block.current_memory_footprint().unwrap(), Footprint { bytes: 0, epoch: 1, resident: false });
        assert_eq!(store.inner.len().unwrap(), 32);

        // manager still has the registration, drop it as the manager would do after a flush
        assert!(block.settle_buffer_registration(report.epoch).unwrap().is_some());
        assert_eq!(block.state().unwrap(), BlockState::SavedClean);
    }

    #[test]
    fn test_merge_on_flush() {
        let (store, buf_mgr) = init(0);
        let block = buf_mgr.create_block::<EventList<TofEvent>>();

        block.modify(|p| p.extend_from_slice(&[tof(1), tof(2)])).unwrap();
        flush(&block, 100);

        // adding records does not load the block
        block.modify(|p| p.push(tof(3))).unwrap();
        assert!(!block.is_loaded().unwrap());
        assert_eq!(block.total_len().unwrap(), 48);

        let report = flush(&block, 0);
        assert_eq!(report.outcome, FlushOutcome::Written { range: FileRange::new(0, 48), prior: Some(FileRange::new(100, 32)) });

        let stored = EventList::<TofEvent>::decode(&store.inner.read(0, 48).unwrap()).unwrap();
        assert_eq!(stored.events(), &[tof(1), tof(2), tof(3)]);

        let events = block.read(|p| p.events().to_vec()).unwrap();
        assert_eq!(events, vec![tof(1), tof(2), tof(3)]);
        assert!(block.is_loaded().unwrap());
        assert!(!block.is_changed().unwrap());
        assert_eq!(block.state().unwrap(), BlockState::DirtyBuffered);

        // loaded but unchanged data is released without writing
        assert!(block.flush_len().unwrap().is_none());
        let report = block.flush_to(None).unwrap();
        assert_eq!(report.outcome, FlushOutcome::Released);
        assert_eq!(block.file_range().unwrap(), Some(FileRange::new(0, 48)));
        assert!(!block.is_loaded().unwrap());

        // removing all records releases the range
        block.modify_loaded(|p| p.events_mut().clear()).unwrap();
        assert!(block.flush_len().unwrap().is_none());
        let report = block.flush_to(None).unwrap();
        assert_eq!(report.outcome, FlushOutcome::Emptied { prior: Some(FileRange::new(0, 48)) });
        assert!(block.file_range().unwrap().is_none());
    }

    #[test]
    fn test_clear_needs_loaded_payload() {
        let (_store, buf_mgr) = init(0);
        let block = buf_mgr.create_block::<EventList<TofEvent>>();

        block.modify(|p| p.extend_from_slice(&[tof(1), tof(2)])).unwrap();
        flush(&block, 0);

        // without loading only records added since the flush are in memory
        block.modify(|p| { p.push(tof(3)); p.events_mut().clear(); }).unwrap();
        assert_eq!(block.read(|p| p.events().to_vec()).unwrap(), vec![tof(1), tof(2)]);

        block.modify_loaded(|p| p.events_mut().clear()).unwrap();
        assert!(block.read(|p| p.is_empty()).unwrap());
    }

    #[test]
    fn test_write_failure_keeps_data() {
        let (store, buf_mgr) = init(0);
        let block = buf_mgr.create_block::<EventList<TofEvent>>();

        block.modify(|p| p.push(tof(1))).unwrap();
        flush(&block, 0);
        block.modify(|p| p.push(tof(2))).unwrap();

        store.fail_writes.store(true, Ordering::Relaxed);
        let err = block.flush_to(Some(FileRange::new(16, 32))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageWriteError);

        // prior range is still in use, data is in memory and already merged
        assert_eq!(block.file_range().unwrap(), Some(FileRange::new(0, 16)));
        assert!(block.is_loaded().unwrap());
        assert!(block.is_changed().unwrap());
        assert_eq!(block.current_memory_footprint().unwrap().epoch, 1);

        store.fail_writes.store(false, Ordering::Relaxed);
        let report = flush(&block, 16);
        assert_eq!(report.outcome, FlushOutcome::Written { range: FileRange::new(16, 32), prior: Some(FileRange::new(0, 16)) });
        assert_eq!(block.read(|p| p.events().to_vec()).unwrap(), vec![tof(1), tof(2)]);
    }

    #[test]
    fn test_read_failure_keeps_data() {
        let (store, buf_mgr) = init(0);
        let block = buf_mgr.create_block::<VarRecords>();

        block.modify(|p| p.push(b"old".to_vec())).unwrap();
        let len = block.flush_len().unwrap().unwrap();
        block.flush_to(Some(FileRange::new(0, len))).unwrap();
        block.modify(|p| p.push(b"new".to_vec())).unwrap();

        store.fail_reads.store(true, Ordering::Relaxed);
        let err = block.flush_to(Some(FileRange::new(7, 14))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StorageReadError);
        assert_eq!(block.read(|p| p.len()).unwrap_err().kind(), ErrorKind::StorageReadError);

        assert_eq!(block.file_range().unwrap(), Some(FileRange::new(0, 7)));
        assert!(!block.is_loaded().unwrap());
        assert_eq!(block.total_len().unwrap(), 14);

        store.fail_reads.store(false, Ordering::Relaxed);
        let records = block.read(|p| p.records().to_vec()).unwrap();
        assert_eq!(records, vec![b"old".to_vec(), b"new".to_vec()]);
    }

    #[test]
    fn test_corrupted_data() {
        let (store, buf_mgr) = init(0);
        store.write(0, &[1, 2, 3]).unwrap();
        buf_mgr.set_free_space(&[], 3).unwrap();

        let block = buf_mgr.open_block::<EventList<TofEvent>>(FileRange::new(0, 3));
        assert_eq!(block.state().unwrap(), BlockState::SavedClean);
        assert_eq!(block.load().unwrap_err().kind(), ErrorKind::CorruptedBlock);
        assert!(!block.is_loaded().unwrap());
    }
}
