//! Disk-backed frame storage.

pub mod frame_store;
