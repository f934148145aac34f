//! Dataset layer for DNA fiber microscopy analysis: archive extraction,
//! summary indexing, and sequential batch loading.
//!
//! ```text
//!   dataset.zip
//!        │  extract (skipped when already expanded)
//!        ▼
//!   <storing>/<stem>/{summary.csv, input/, fibers/, profiles/}
//!        │  load + sort
//!        ▼
//!   ┌──────────────┐
//!   │ SummaryTable │  one row per fiber, keyed (experiment, image, fiber)
//!   └──────────────┘
//!        │  derive (one shared shuffle)
//!        ▼
//!   image_index / profile_index  +  forward-only cursors
//!        │  next_image_batch / next_profile_batch
//!        ▼
//!   lazy ImageRecord / ProfileRecord iterators
//! ```
//!
//! The reverse path ([`Dataset::save`], [`Dataset::create`]) re-packages a
//! directory layout into a new archive, selecting files through the summary.
//!
//! Extraction and assembly are not atomic: a failure can leave a partially
//! populated directory or archive behind.

pub mod archive;
pub mod data;
pub mod dataset;
pub mod error;

pub use data::model::{
    FiberTrace, ImageKey, ImageRecord, MetadataValue, ProfileKey, ProfileRecord, ProfileSample,
    SummaryRow, PROFILE_INFIX,
};
pub use data::summary::SummaryTable;
pub use dataset::{Dataset, DatasetOptions, ImageBatch, ProfileBatch};
pub use error::{DatasetError, Result};
