pub mod free_space;
pub mod payload;
pub mod block;
