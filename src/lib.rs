//! Out-of-core block storage.
//!
//! Large collections of records are split into blocks which are kept in memory while they are
//! being filled and are written to a single backing file when memory runs short.
//!
//! Clients can
//!   - create blocks and append records to them without reading the stored part back
//!   - read or modify the whole block content, loading it from disk on demand
//!   - limit memory used by not yet written blocks and flush them explicitly
//!   - persist the free space map of the backing file and reopen stored blocks later
//!   - set configuration options
//!

mod buf_mgr;
mod common;
mod storage;
mod system;
mod block_mgr;

pub use common::errors::Error;
pub use common::errors::ErrorKind;
pub use common::defs::FileRange;
pub use common::defs::UNSET_OFFSET;
pub use system::config::Config;
pub use system::config::ConfigMt;
pub use storage::store::BackingStore;
pub use storage::store::FileStore;
pub use storage::mem_store::MemStore;
pub use block_mgr::free_space::FreeSpaceMap;
pub use block_mgr::payload::Payload;
pub use block_mgr::payload::EventRecord;
pub use block_mgr::payload::EventList;
pub use block_mgr::payload::TofEvent;
pub use block_mgr::payload::WeightedEvent;
pub use block_mgr::payload::VarRecords;
pub use block_mgr::block::Saveable;
pub use block_mgr::block::SaveableBlock;
pub use block_mgr::block::BlockState;
pub use block_mgr::block::BufferSlot;
pub use block_mgr::block::FilePosition;
pub use block_mgr::block::Footprint;
pub use block_mgr::block::FlushOutcome;
pub use block_mgr::block::FlushReport;
pub use buf_mgr::buf_mgr::BufferManager;
pub use buf_mgr::buf_mgr::PendingItem;
pub use buf_mgr::pending::BufferHandle;
pub use buf_mgr::pending::EvictionMech;
