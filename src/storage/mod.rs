pub mod store;
pub mod mem_store;
