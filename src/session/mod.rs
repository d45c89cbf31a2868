//! Run lifecycle: generation into a temporary frame store, then export.

pub mod generator;
pub mod state;
