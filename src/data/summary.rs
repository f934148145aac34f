use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;

use crate::error::{DatasetError, Result};

use super::model::{ImageKey, MetadataValue, ProfileKey, SummaryRow};

// ---------------------------------------------------------------------------
// SummaryTable
// ---------------------------------------------------------------------------

/// The dataset summary: one row per fiber, keyed by
/// (experiment, image, fiber) and sorted by key ascending. Read-only once
/// loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    rows: Vec<SummaryRow>,
    /// Non-key column names, in file order.
    columns: Vec<String>,
}

impl SummaryTable {
    /// Load a summary CSV. The header must contain `experiment`, `image` and
    /// `fiber`; every other column is kept as metadata in header order.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let mut reader =
            csv::Reader::from_path(path).map_err(|source| DatasetError::table(path, source))?;
        let headers: Vec<String> = reader
            .headers()
            .map_err(|source| DatasetError::table(path, source))?
            .iter()
            .map(str::to_string)
            .collect();

        let position = |column: &'static str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| DatasetError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        let experiment_idx = position("experiment")?;
        let image_idx = position("image")?;
        let fiber_idx = position("fiber")?;

        let columns: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != experiment_idx && *i != image_idx && *i != fiber_idx)
            .map(|(_, h)| h.clone())
            .collect();

        let mut rows = Vec::new();
        for (row_no, record) in reader.records().enumerate() {
            let record = record.map_err(|source| DatasetError::table(path, source))?;

            let fiber_field = record.get(fiber_idx).unwrap_or("").trim();
            let fiber: u32 = fiber_field.parse().map_err(|_| {
                DatasetError::malformed(path, row_no, format!("'{fiber_field}' is not a fiber id"))
            })?;
            let key = ProfileKey::new(
                record.get(experiment_idx).unwrap_or(""),
                record.get(image_idx).unwrap_or(""),
                fiber,
            );

            let mut values = BTreeMap::new();
            for (i, field) in record.iter().enumerate() {
                if i == experiment_idx || i == image_idx || i == fiber_idx {
                    continue;
                }
                if let Some(name) = headers.get(i) {
                    values.insert(name.clone(), MetadataValue::parse(field));
                }
            }

            rows.push(SummaryRow { key, values });
        }

        rows.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(SummaryTable { rows, columns })
    }

    /// All rows, sorted by key.
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Non-key column names in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows (fibers).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows matching the given key, usually exactly one.
    pub fn rows_for(&self, key: &ProfileKey) -> Vec<&SummaryRow> {
        self.rows.iter().filter(|row| &row.key == key).collect()
    }

    /// Distinct (experiment, image) keys in row order.
    pub fn image_keys(&self) -> Vec<ImageKey> {
        derive_indices(&self.rows).0
    }

    /// Distinct (experiment, image, fiber) keys in row order.
    pub fn profile_keys(&self) -> Vec<ProfileKey> {
        derive_indices(&self.rows).1
    }

    /// Serialize back to CSV, the inverse of [`SummaryTable::from_csv`].
    pub fn to_csv<W: io::Write>(&self, out: W) -> std::result::Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(out);

        let mut header: Vec<&str> = vec!["experiment", "image", "fiber"];
        header.extend(self.columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = vec![
                row.key.experiment.clone(),
                row.key.image.clone(),
                row.key.fiber.to_string(),
            ];
            for column in &self.columns {
                record.push(
                    row.values
                        .get(column)
                        .map(MetadataValue::to_field)
                        .unwrap_or_default(),
                );
            }
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Derive the two index views from rows in the given order, deduplicating
/// while preserving first occurrence.
pub(crate) fn derive_indices<'a, I>(rows: I) -> (Vec<ImageKey>, Vec<ProfileKey>)
where
    I: IntoIterator<Item = &'a SummaryRow>,
{
    let mut image_index = Vec::new();
    let mut profile_index = Vec::new();
    let mut seen_images = HashSet::new();
    let mut seen_profiles = HashSet::new();

    for row in rows {
        if seen_profiles.insert(row.key.clone()) {
            profile_index.push(row.key.clone());
        }
        let image = row.key.image_key();
        if seen_images.insert(image.clone()) {
            image_index.push(image);
        }
    }

    (image_index, profile_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatasetError;

    fn table_from(contents: &str) -> Result<SummaryTable> {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("summary.csv");
        std::fs::write(&path, contents).expect("write summary");
        SummaryTable::from_csv(&path)
    }

    #[test]
    fn rows_are_sorted_by_key() {
        let table = table_from(
            "experiment,image,fiber,pattern\n\
             exp2,img1,1,stalled\n\
             exp1,img2,2,ongoing\n\
             exp1,img2,1,ongoing\n",
        )
        .unwrap();

        let keys: Vec<ProfileKey> = table.rows().iter().map(|r| r.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                ProfileKey::new("exp1", "img2", 1),
                ProfileKey::new("exp1", "img2", 2),
                ProfileKey::new("exp2", "img1", 1),
            ]
        );
        assert_eq!(table.columns(), ["pattern".to_string()]);
    }

    #[test]
    fn missing_key_column_is_rejected() {
        let err = table_from("experiment,image,pattern\nexp1,img1,ongoing\n").unwrap_err();
        match err {
            DatasetError::MissingColumn { column, .. } => assert_eq!(column, "fiber"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_fiber_id_is_rejected() {
        let err = table_from("experiment,image,fiber\nexp1,img1,abc\n").unwrap_err();
        assert!(matches!(err, DatasetError::MalformedRow { row: 0, .. }));
    }

    #[test]
    fn indices_deduplicate_preserving_first_occurrence() {
        let table = table_from(
            "experiment,image,fiber\n\
             exp1,img1,1\n\
             exp1,img1,2\n\
             exp1,img2,1\n",
        )
        .unwrap();

        assert_eq!(
            table.image_keys(),
            vec![ImageKey::new("exp1", "img1"), ImageKey::new("exp1", "img2")]
        );
        assert_eq!(table.profile_keys().len(), 3);
        assert!(table.image_keys().len() <= table.profile_keys().len());
    }

    #[test]
    fn rows_for_returns_matching_rows() {
        let table = table_from(
            "experiment,image,fiber,length\n\
             exp1,img1,1,10.5\n\
             exp1,img1,2,7.25\n",
        )
        .unwrap();

        let rows = table.rows_for(&ProfileKey::new("exp1", "img1", 2));
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].values.get("length"),
            Some(&MetadataValue::Float(7.25))
        );
        assert!(table.rows_for(&ProfileKey::new("exp1", "img9", 1)).is_empty());
    }

    #[test]
    fn csv_serialization_round_trips() {
        let table = table_from(
            "experiment,image,fiber,pattern,length\n\
             exp1,img1,1,ongoing,10.5\n\
             exp1,img2,1,,12\n",
        )
        .unwrap();

        let mut buffer = Vec::new();
        table.to_csv(&mut buffer).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        std::fs::write(&path, buffer).unwrap();
        let reloaded = SummaryTable::from_csv(&path).unwrap();

        assert_eq!(reloaded, table);
    }
}
