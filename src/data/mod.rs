//! Data layer: core types, the summary table, and per-key file loading.

pub mod loader;
pub mod model;
pub mod summary;
