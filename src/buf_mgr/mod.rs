pub mod pending;
pub mod buf_mgr;
