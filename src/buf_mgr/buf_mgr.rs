/// Write-behind buffer management
///
/// Buffer manager keeps track of blocks holding data in memory and the amount of memory they
/// occupy. When the total exceeds write threshold blocks are flushed to the backing store in
/// the order defined by the eviction mechanism until the total goes down below the threshold.
/// Every flush writes block data to a newly allocated range and frees the range it occupied
/// before, so the prior data stays intact until the new copy is written.
///
/// Buffer manager does not own blocks: it keeps weak references, and the block owner decides
/// when a block is destroyed.


use crate::common::errors::Error;
use crate::common::defs::FileRange;
use crate::common::defs::Sequence;
use crate::system::config::ConfigMt;
use crate::storage::store::BackingStore;
use crate::block_mgr::free_space::FreeSpaceMap;
use crate::block_mgr::payload::Payload;
use crate::block_mgr::block::Saveable;
use crate::block_mgr::block::SaveableBlock;
use crate::block_mgr::block::FilePosition;
use crate::block_mgr::block::FlushOutcome;
use crate::buf_mgr::pending::EvictionMech;
use crate::buf_mgr::pending::BufferHandle;
use crate::buf_mgr::pending::eviction_mech;
use std::sync::Arc;
use std::sync::Weak;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;
use log::info;
use log::debug;
use log::warn;


/// Registry entry.
#[derive(Clone)]
pub struct PendingItem {
    pub block_id:   u64,
    pub block:      Weak<dyn Saveable>,
}


struct Registry {
    pending:    Box<dyn EvictionMech<PendingItem>>,
    total:      u64,
    free_space: FreeSpaceMap,
}


pub struct BufferManager {
    registry:   Mutex<Registry>,
    threshold:  AtomicI64,
    store:      Arc<dyn BackingStore>,
    block_seq:  Sequence,
}

impl BufferManager {

    pub fn new(conf: &ConfigMt, store: Arc<dyn BackingStore>) -> Result<Arc<Self>, Error> {
        let conf = conf.get_conf()?;

        let threshold = *conf.get_write_buffer_size();
        let policy = conf.get_eviction_policy().clone();
        let pending = eviction_mech::<PendingItem>(&policy)?;
        let free_space = FreeSpaceMap::new(*conf.get_store_size_limit());

        drop(conf);

        info!("Buffer manager created: write threshold {}, eviction policy {}", threshold, policy);

        Ok(Arc::new(BufferManager {
            registry: Mutex::new(Registry {
                pending,
                total: 0,
                free_space,
            }),
            threshold: AtomicI64::new(threshold),
            store,
            block_seq: Sequence::new(1),
        }))
    }

    /// Set write threshold; 0 or negative value disables automatic flushing.
    /// New value takes effect on the next mark_dirty.
    pub fn configure(&self, write_threshold: i64) {
        self.threshold.store(write_threshold, Ordering::Relaxed);
    }

    pub fn write_threshold(&self) -> i64 {
        self.threshold.load(Ordering::Relaxed)
    }

    /// Create new empty block.
    pub fn create_block<P: Payload>(self: &Arc<Self>) -> Arc<SaveableBlock<P>> {
        let id = self.block_seq.get_next();
        Arc::new(SaveableBlock::new(id, FilePosition::unset(), self.store.clone(), self.clone()))
    }

    /// Create block for data already stored in the range; the range must be occupied
    /// according to the free space map (see set_free_space).
    pub fn open_block<P: Payload>(self: &Arc<Self>, range: FileRange) -> Arc<SaveableBlock<P>> {
        let id = self.block_seq.get_next();
        Arc::new(SaveableBlock::new(id, FilePosition::new(range), self.store.clone(), self.clone()))
    }

    /// Register the block or update its footprint, and flush blocks if write threshold is
    /// exceeded.
    pub fn mark_dirty<S: Saveable + 'static>(&self, block: &Arc<S>) -> Result<(), Error> {
        let fp = block.current_memory_footprint()?;

        let total = {
            let mut reg = self.lock_registry()?;

            // footprint older than the accounted one is ignored
            let accepted = block.lock_buffer_slot()?.accepts(&fp);

            if accepted && fp.resident {
                let handle = match block.buffer_handle()? {
                    Some(h) => {
                        reg.pending.on_access(h);
                        h
                    },
                    None => {
                        let weak: Weak<S> = Arc::downgrade(block);
                        let weak: Weak<dyn Saveable> = weak;
                        reg.pending.add_item(PendingItem {
                            block_id: block.id(),
                            block: weak,
                        })
                    }
                };

                let prev = block.register_with_buffer(handle, &fp)?;
                reg.total = reg.total.saturating_sub(prev) + fp.bytes;
            } else if accepted {
                Self::forget_locked(&mut reg, &**block)?;
            }

            reg.total
        };

        if self.over_threshold(total) {
            self.eviction_pass()?;
        }

        Ok(())
    }

    /// Flush blocks until total is not greater than write threshold; return number of
    /// blocks written.
    pub fn eviction_pass(&self) -> Result<usize, Error> {
        let mut budget = self.pending_count()?;
        let mut written = 0;

        while budget > 0 {
            let victim = {
                let reg = self.lock_registry()?;
                if !self.over_threshold(reg.total) {
                    break;
                }

                match reg.pending.victim() {
                    Some(v) => v,
                    None => break,
                }
            };

            budget -= 1;
            if self.flush_registered(victim)? {
                written += 1;
            }
        }

        if written > 0 {
            debug!("Eviction pass wrote {} blocks, write buffer used {}", written, self.write_buffer_used()?);
        }

        Ok(written)
    }

    /// Flush every registered block regardless of threshold; return number of blocks written.
    pub fn flush_all(&self) -> Result<usize, Error> {
        let entries = self.lock_registry()?.pending.snapshot();

        let mut written = 0;
        for entry in entries {
            if self.flush_registered(entry)? {
                written += 1;
            }
        }

        Ok(written)
    }

    /// Write block data to a newly allocated range, and release block memory.
    /// Return true if anything was written.
    pub fn flush_block(&self, block: &dyn Saveable) -> Result<bool, Error> {
        loop {
            let allocated = match block.flush_len()? {
                Some(len) => {
                    let offset = self.lock_registry()?.free_space.allocate(len)?;
                    Some(FileRange::new(offset, len))
                },
                None => None,
            };

            let report = match block.flush_to(allocated) {
                Ok(report) => report,
                Err(e) => {
                    if let Some(r) = allocated {
                        self.lock_registry()?.free_space.free(r.offset, r.length)?;
                    }
                    return Err(e);
                }
            };

            let mut reg = self.lock_registry()?;

            let written = match report.outcome {
                FlushOutcome::Outgrown { needed } => {
                    // block grew after its length was taken
                    if let Some(r) = allocated {
                        reg.free_space.free(r.offset, r.length)?;
                    }
                    debug!("Block {} needs {} bytes, retrying flush", block.id(), needed);
                    continue;
                },
                FlushOutcome::Written { range, prior } => {
                    if let Some(r) = allocated {
                        if range.length < r.length {
                            reg.free_space.shrink(r.offset, r.length, range.length)?;
                        }
                    }
                    if let Some(p) = prior {
                        reg.free_space.free(p.offset, p.length)?;
                    }
                    true
                },
                FlushOutcome::Emptied { prior } => {
                    if let Some(r) = allocated {
                        reg.free_space.free(r.offset, r.length)?;
                    }
                    if let Some(p) = prior {
                        reg.free_space.free(p.offset, p.length)?;
                    }
                    false
                },
                FlushOutcome::Released | FlushOutcome::Idle => {
                    if let Some(r) = allocated {
                        reg.free_space.free(r.offset, r.length)?;
                    }
                    false
                },
            };

            if let Some((h, footprint)) = block.settle_buffer_registration(report.epoch)? {
                reg.pending.remove(h);
                reg.total = reg.total.saturating_sub(footprint);
            }

            return Ok(written);
        }
    }

    /// Remove block from the registry without flushing. Block data in memory is not released,
    /// and its on-disk range stays occupied.
    pub fn forget(&self, block: &dyn Saveable) -> Result<(), Error> {
        let mut reg = self.lock_registry()?;
        Self::forget_locked(&mut reg, block)
    }

    /// Block is being destroyed: remove it from the registry and free its range.
    pub fn object_deleted(&self, block: &dyn Saveable) -> Result<(), Error> {
        let range = block.file_range()?;

        let mut reg = self.lock_registry()?;
        Self::forget_locked(&mut reg, block)?;
        if let Some(r) = range {
            reg.free_space.free(r.offset, r.length)?;
        }

        Ok(())
    }

    /// Return range to the free space allocator.
    pub fn free_range(&self, range: FileRange) -> Result<(), Error> {
        self.lock_registry()?.free_space.free(range.offset, range.length)
    }

    /// Memory occupied by registered blocks.
    pub fn write_buffer_used(&self) -> Result<u64, Error> {
        Ok(self.lock_registry()?.total)
    }

    pub fn pending_count(&self) -> Result<usize, Error> {
        Ok(self.lock_registry()?.pending.len())
    }

    pub fn file_end(&self) -> Result<u64, Error> {
        Ok(self.lock_registry()?.free_space.file_end())
    }

    pub fn free_bytes(&self) -> Result<u64, Error> {
        Ok(self.lock_registry()?.free_space.free_bytes())
    }

    /// Free space map as flat list of offset and length pairs.
    pub fn free_space_vector(&self) -> Result<Vec<u64>, Error> {
        Ok(self.lock_registry()?.free_space.free_space_vector())
    }

    /// Restore free space map saved with free_space_vector.
    pub fn set_free_space(&self, free: &[u64], file_end: u64) -> Result<(), Error> {
        self.lock_registry()?.free_space.set_free_space(free, file_end)
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    fn forget_locked(reg: &mut Registry, block: &dyn Saveable) -> Result<(), Error> {
        if let Some((h, footprint)) = block.forget_buffer_registration()? {
            reg.pending.remove(h);
            reg.total = reg.total.saturating_sub(footprint);
        }
        Ok(())
    }

    fn flush_registered(&self, entry: (BufferHandle, PendingItem)) -> Result<bool, Error> {
        let (h, item) = entry;

        let block = match item.block.upgrade() {
            Some(block) => block,
            None => {
                // block is being dropped; its destructor deducts the footprint
                warn!("Skipping block {} which is being destroyed", item.block_id);
                self.lock_registry()?.pending.remove(h);
                return Ok(false);
            }
        };

        // registry lock must be released before the block can be dropped
        self.flush_block(&*block)
    }

    fn over_threshold(&self, total: u64) -> bool {
        let threshold = self.threshold.load(Ordering::Relaxed);
        threshold > 0 && total > threshold as u64
    }

    fn lock_registry(&self) -> Result<MutexGuard<Registry>, Error> {
        self.registry.lock().map_err(|_| Error::lock_error())
    }
}
