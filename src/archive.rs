//! Dataset archive extraction and assembly.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use zip::write::SimpleFileOptions;

use crate::data::summary::SummaryTable;
use crate::error::{DatasetError, Result};

/// Directory a dataset archive expands into: `storing_path/<archive stem>/`.
pub fn dataset_dir(archive: &Path, storing_path: &Path) -> PathBuf {
    let stem = archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    storing_path.join(stem)
}

/// Extract `archive` under `storing_path`, returning the dataset directory.
///
/// Extraction is skipped when the directory already exists, unless `force`
/// is set. A failed extraction may leave the directory partially populated;
/// no cleanup is attempted.
pub fn extract_archive(archive: &Path, storing_path: &Path, force: bool) -> Result<PathBuf> {
    let target = dataset_dir(archive, storing_path);
    if target.exists() && !force {
        debug!("dataset already extracted at {}", target.display());
        return Ok(target);
    }

    info!("extracting {} into {}", archive.display(), target.display());
    let file = File::open(archive).map_err(|source| DatasetError::io(archive, source))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|source| DatasetError::archive(archive, source))?;
    zip.extract(&target)
        .map_err(|source| DatasetError::archive(archive, source))?;
    Ok(target)
}

/// Build a dataset archive from a summary table and three source
/// directories.
///
/// For every distinct image key the image TIFF and the fiber annotation
/// bundle are stored; for every distinct profile key the profile CSV is
/// stored. Entries live under the base name of each source directory, and
/// the serialized summary is written as a root `summary.csv` entry so the
/// archive can be opened as a dataset again. A missing source file aborts
/// the assembly, leaving the output partially written.
pub fn assemble_archive(
    summary: &SummaryTable,
    output: &Path,
    images_dir: &Path,
    fibers_dir: &Path,
    profiles_dir: &Path,
) -> Result<()> {
    let file = File::create(output).map_err(|source| DatasetError::io(output, source))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut summary_csv = Vec::new();
    summary
        .to_csv(&mut summary_csv)
        .map_err(|source| DatasetError::table(output, source))?;
    zip.start_file("summary.csv", options)
        .map_err(|source| DatasetError::archive(output, source))?;
    zip.write_all(&summary_csv)
        .map_err(|source| DatasetError::io(output, source))?;

    for key in summary.image_keys() {
        let stem = key.stem();
        append_file(&mut zip, options, images_dir, &format!("{stem}.tif"), output)?;
        append_file(&mut zip, options, fibers_dir, &format!("{stem}.zip"), output)?;
    }
    for key in summary.profile_keys() {
        append_file(&mut zip, options, profiles_dir, &key.profile_file_name(), output)?;
    }

    zip.finish()
        .map_err(|source| DatasetError::archive(output, source))?;
    info!("assembled {} ({} fibers)", output.display(), summary.len());
    Ok(())
}

fn append_file(
    zip: &mut zip::ZipWriter<File>,
    options: SimpleFileOptions,
    source_dir: &Path,
    file_name: &str,
    output: &Path,
) -> Result<()> {
    let source = source_dir.join(file_name);
    let base = source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    // Zip entry names always use forward slashes.
    let entry = format!("{base}/{file_name}");

    let mut file = File::open(&source).map_err(|source_err| DatasetError::io(&source, source_err))?;
    zip.start_file(entry, options)
        .map_err(|source_err| DatasetError::archive(output, source_err))?;
    io::copy(&mut file, zip).map_err(|source_err| DatasetError::io(&source, source_err))?;
    Ok(())
}
