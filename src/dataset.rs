//! The dataset session object: construction, batch iteration and
//! re-packaging.

use std::env;
use std::ops::Range;
use std::path::{Path, PathBuf};

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::archive::{assemble_archive, extract_archive};
use crate::data::loader;
use crate::data::model::{ImageKey, ImageRecord, ProfileKey, ProfileRecord};
use crate::data::summary::{derive_indices, SummaryTable};
use crate::error::Result;

/// Directory holding the images on the read side.
const IMAGE_READ_DIR: &str = "input";
/// Directory `save` sources images from when re-packaging a dataset.
const IMAGE_SAVE_DIR: &str = "images";
const FIBERS_DIR: &str = "fibers";
const PROFILES_DIR: &str = "profiles";
const SUMMARY_FILE: &str = "summary.csv";

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Construction parameters for [`Dataset`].
#[derive(Debug, Clone)]
pub struct DatasetOptions {
    /// Where the archive is expanded. Defaults to the system temp directory.
    pub storing_path: PathBuf,
    /// Re-extract even when the dataset directory already exists.
    pub force_decompress: bool,
    /// Draw one random permutation of the summary rows before deriving the
    /// image and profile indices.
    pub shuffle: bool,
    /// Seed for a deterministic shuffle; `None` draws a fresh permutation.
    pub seed: Option<u64>,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        Self {
            storing_path: env::temp_dir(),
            force_decompress: false,
            shuffle: true,
            seed: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Dataset
// ---------------------------------------------------------------------------

/// A decompressed, indexed dataset session.
///
/// Construction extracts the archive (skipped when already expanded), loads
/// the summary table and derives both index views from a single permutation
/// of its rows. Batch state lives in two cursors that only move forward;
/// there is no rewind. Batch calls take `&mut self`, so one session cannot
/// be drawn from concurrently.
#[derive(Debug)]
pub struct Dataset {
    archive: PathBuf,
    dataset_path: PathBuf,
    summary: SummaryTable,
    image_index: Vec<ImageKey>,
    profile_index: Vec<ProfileKey>,
    image_cursor: usize,
    profile_cursor: usize,
}

/// Selects which index/cursor pair a batch call works on.
#[derive(Clone, Copy)]
enum BatchKind {
    Image,
    Profile,
}

impl Dataset {
    /// Open a dataset archive with default options.
    pub fn open(archive: impl AsRef<Path>) -> Result<Self> {
        Self::with_options(archive, DatasetOptions::default())
    }

    /// Open a dataset archive.
    pub fn with_options(archive: impl AsRef<Path>, options: DatasetOptions) -> Result<Self> {
        let archive = archive.as_ref().to_path_buf();
        let dataset_path =
            extract_archive(&archive, &options.storing_path, options.force_decompress)?;
        let summary = SummaryTable::from_csv(&dataset_path.join(SUMMARY_FILE))?;

        let mut order: Vec<usize> = (0..summary.len()).collect();
        if options.shuffle {
            match options.seed {
                Some(seed) => order.shuffle(&mut StdRng::seed_from_u64(seed)),
                None => order.shuffle(&mut rand::thread_rng()),
            }
        }
        let (image_index, profile_index) =
            derive_indices(order.iter().map(|&i| &summary.rows()[i]));

        debug!(
            "indexed {} images / {} profiles from {}",
            image_index.len(),
            profile_index.len(),
            archive.display()
        );

        Ok(Self {
            archive,
            dataset_path,
            summary,
            image_index,
            profile_index,
            image_cursor: 0,
            profile_cursor: 0,
        })
    }

    /// Path of the source archive.
    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    /// Directory the archive was expanded into.
    pub fn dataset_path(&self) -> &Path {
        &self.dataset_path
    }

    pub fn summary(&self) -> &SummaryTable {
        &self.summary
    }

    /// Image-granularity index, in (possibly shuffled) derivation order.
    pub fn image_index(&self) -> &[ImageKey] {
        &self.image_index
    }

    /// Profile-granularity index, in (possibly shuffled) derivation order.
    pub fn profile_index(&self) -> &[ProfileKey] {
        &self.profile_index
    }

    /// Consume up to `batch_size` keys (all remaining when `None`), moving
    /// the cursor. The cursor is advanced by the requested size even past
    /// the end; only the returned range is clamped to the index. A call with
    /// the cursor already at or past the end yields the empty range and
    /// leaves the cursor untouched.
    fn take_range(&mut self, kind: BatchKind, batch_size: Option<usize>) -> Range<usize> {
        let (len, cursor) = match kind {
            BatchKind::Image => (self.image_index.len(), &mut self.image_cursor),
            BatchKind::Profile => (self.profile_index.len(), &mut self.profile_cursor),
        };
        if *cursor >= len {
            return 0..0;
        }
        let begin = *cursor;
        *cursor = begin + batch_size.unwrap_or(len);
        begin..(*cursor).min(len)
    }

    /// Next image batch as a lazy iterator of [`ImageRecord`]s.
    ///
    /// `None` means "the rest of the index". Elements are loaded from disk
    /// one `next()` at a time; exhausting the iterator and calling again
    /// resumes from the advanced cursor.
    pub fn next_image_batch(&mut self, batch_size: Option<usize>) -> ImageBatch<'_> {
        let range = self.take_range(BatchKind::Image, batch_size);
        ImageBatch {
            dataset: self,
            range,
            failed: false,
        }
    }

    /// Next profile batch as a lazy iterator of [`ProfileRecord`]s. Same
    /// cursor semantics as [`Dataset::next_image_batch`].
    pub fn next_profile_batch(&mut self, batch_size: Option<usize>) -> ProfileBatch<'_> {
        let range = self.take_range(BatchKind::Profile, batch_size);
        ProfileBatch {
            dataset: self,
            range,
            failed: false,
        }
    }

    fn image_record(&self, key: &ImageKey) -> Result<ImageRecord> {
        let stem = key.stem();
        let image = loader::load_image(
            &self
                .dataset_path
                .join(IMAGE_READ_DIR)
                .join(format!("{stem}.tif")),
        )?;
        let fibers = loader::load_fiber_traces(
            &self
                .dataset_path
                .join(FIBERS_DIR)
                .join(format!("{stem}.zip")),
        )?;
        Ok(ImageRecord {
            key: key.clone(),
            image,
            fibers,
        })
    }

    fn profile_record(&self, key: &ProfileKey) -> Result<ProfileRecord> {
        let samples = loader::load_profile(
            &self
                .dataset_path
                .join(PROFILES_DIR)
                .join(key.profile_file_name()),
        )?;
        let summary = self.summary.rows_for(key).into_iter().cloned().collect();
        Ok(ProfileRecord {
            key: key.clone(),
            samples,
            summary,
        })
    }

    /// Re-package this dataset as a new archive, selecting files through the
    /// in-memory summary. Images are sourced from the dataset's `images/`
    /// directory, matching the assembly layout.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        assemble_archive(
            &self.summary,
            path.as_ref(),
            &self.dataset_path.join(IMAGE_SAVE_DIR),
            &self.dataset_path.join(FIBERS_DIR),
            &self.dataset_path.join(PROFILES_DIR),
        )
    }

    /// Build a dataset archive from a summary CSV and three source
    /// directories. The summary selects which files belong to the dataset.
    pub fn create(
        summary_csv: impl AsRef<Path>,
        images_dir: impl AsRef<Path>,
        fibers_dir: impl AsRef<Path>,
        profiles_dir: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<()> {
        let summary = SummaryTable::from_csv(summary_csv.as_ref())?;
        assemble_archive(
            &summary,
            output.as_ref(),
            images_dir.as_ref(),
            fibers_dir.as_ref(),
            profiles_dir.as_ref(),
        )
    }
}

// ---------------------------------------------------------------------------
// Batch iterators
// ---------------------------------------------------------------------------

/// Lazy image batch. Each `next()` loads one image and its fiber traces
/// from disk. The first element error is yielded as `Err` and terminates
/// the batch; the cursor stays where the batch call put it.
pub struct ImageBatch<'a> {
    dataset: &'a Dataset,
    range: Range<usize>,
    failed: bool,
}

impl Iterator for ImageBatch<'_> {
    type Item = Result<ImageRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let i = self.range.next()?;
        let record = self.dataset.image_record(&self.dataset.image_index[i]);
        self.failed = record.is_err();
        Some(record)
    }
}

/// Lazy profile batch. Each `next()` loads one profile CSV and looks up the
/// matching summary row(s). Error semantics as [`ImageBatch`].
pub struct ProfileBatch<'a> {
    dataset: &'a Dataset,
    range: Range<usize>,
    failed: bool,
}

impl Iterator for ProfileBatch<'_> {
    type Item = Result<ProfileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let i = self.range.next()?;
        let record = self.dataset.profile_record(&self.dataset.profile_index[i]);
        self.failed = record.is_err();
        Some(record)
    }
}
