use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use image::DynamicImage;

use crate::error::{DatasetError, Result};

use super::model::{FiberTrace, ProfileSample};

/// Decode a microscopy image (16-bit grayscale TIFF in practice).
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| DatasetError::image(path, source))
}

/// Read all fiber traces of one image from its annotation bundle: a zip
/// whose entries each hold one polyline as `x,y` lines, in archive order.
pub fn load_fiber_traces(path: &Path) -> Result<Vec<FiberTrace>> {
    let file = File::open(path).map_err(|source| DatasetError::io(path, source))?;
    let mut archive = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|source| DatasetError::archive(path, source))?;

    let mut traces = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|source| DatasetError::archive(path, source))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let points = read_points(entry, path, &name)?;
        traces.push(FiberTrace { name, points });
    }
    Ok(traces)
}

fn read_points<R: Read>(reader: R, path: &Path, entry: &str) -> Result<Vec<[f64; 2]>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(reader);

    let mut points = Vec::new();
    for (row_no, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|source| DatasetError::table(path, source))?;
        let coord = |i: usize| -> Result<f64> {
            let field = record.get(i).unwrap_or("").trim();
            field.parse().map_err(|_| {
                DatasetError::malformed(
                    path,
                    row_no,
                    format!("entry '{entry}': '{field}' is not a coordinate"),
                )
            })
        };
        points.push([coord(0)?, coord(1)?]);
    }
    Ok(points)
}

/// Load one intensity profile CSV: header row skipped, then position and the
/// two channel intensities read from the first three columns.
pub fn load_profile(path: &Path) -> Result<Vec<ProfileSample>> {
    let mut reader =
        csv::Reader::from_path(path).map_err(|source| DatasetError::table(path, source))?;

    let mut samples = Vec::new();
    for (row_no, record) in reader.records().enumerate() {
        let record = record.map_err(|source| DatasetError::table(path, source))?;
        let column = |i: usize, name: &str| -> Result<f64> {
            let field = record.get(i).unwrap_or("").trim();
            field.parse().map_err(|_| {
                DatasetError::malformed(path, row_no, format!("{name}: '{field}' is not numeric"))
            })
        };
        samples.push(ProfileSample {
            position: column(0, "position")?,
            channel1: column(1, "channel1")?,
            channel2: column(2, "channel2")?,
        });
    }
    Ok(samples)
}
