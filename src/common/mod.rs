pub mod errors;
pub mod defs;
