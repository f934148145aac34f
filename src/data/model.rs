use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Filename token sitting between the image stem and the fiber id in profile
/// CSV names, e.g. `exp1-img2-Profiles #3.csv`. The load and save paths both
/// go through this constant so naming stays symmetric.
pub const PROFILE_INFIX: &str = "-Profiles #";

// ---------------------------------------------------------------------------
// Keys
// ---------------------------------------------------------------------------

/// Identifies one microscopy image: (experiment, image).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageKey {
    pub experiment: String,
    pub image: String,
}

impl ImageKey {
    pub fn new(experiment: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            experiment: experiment.into(),
            image: image.into(),
        }
    }

    /// File stem shared by the image TIFF and its fiber annotation bundle.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.experiment, self.image)
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.experiment, self.image)
    }
}

/// Identifies one traced fiber (and its intensity profile) within an image:
/// (experiment, image, fiber).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProfileKey {
    pub experiment: String,
    pub image: String,
    pub fiber: u32,
}

impl ProfileKey {
    pub fn new(experiment: impl Into<String>, image: impl Into<String>, fiber: u32) -> Self {
        Self {
            experiment: experiment.into(),
            image: image.into(),
            fiber,
        }
    }

    /// Drop the fiber component.
    pub fn image_key(&self) -> ImageKey {
        ImageKey::new(self.experiment.clone(), self.image.clone())
    }

    /// File stem shared with the image-level files.
    pub fn stem(&self) -> String {
        format!("{}-{}", self.experiment, self.image)
    }

    /// Name of the profile CSV holding this fiber's intensity samples.
    pub fn profile_file_name(&self) -> String {
        format!("{}{}{}.csv", self.stem(), PROFILE_INFIX, self.fiber)
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} #{}", self.experiment, self.image, self.fiber)
    }
}

// ---------------------------------------------------------------------------
// MetadataValue – a single non-key summary cell
// ---------------------------------------------------------------------------

/// A dynamically-typed summary cell. The summary schema is open beyond the
/// three key columns, so values keep whatever type their text narrows to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl MetadataValue {
    /// Parse a CSV field, preferring the narrowest type that fits.
    pub fn parse(field: &str) -> Self {
        if field.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = field.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = field.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        if field == "true" || field == "false" {
            return MetadataValue::Bool(field == "true");
        }
        MetadataValue::String(field.to_string())
    }

    /// Inverse of [`MetadataValue::parse`], used when writing the summary
    /// back to CSV. `Null` becomes the empty field.
    pub fn to_field(&self) -> String {
        match self {
            MetadataValue::String(s) => s.clone(),
            MetadataValue::Integer(i) => i.to_string(),
            MetadataValue::Float(v) => v.to_string(),
            MetadataValue::Bool(b) => b.to_string(),
            MetadataValue::Null => String::new(),
        }
    }

    /// Interpret the value as an `f64` where that makes sense.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

// ---------------------------------------------------------------------------
// Rows and records
// ---------------------------------------------------------------------------

/// One row of the summary table: one fiber, one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub key: ProfileKey,
    /// Non-key columns: column name → value.
    pub values: BTreeMap<String, MetadataValue>,
}

/// One sample of an intensity profile: pixel position along the fiber path
/// plus the two channel intensities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSample {
    pub position: f64,
    pub channel1: f64,
    pub channel2: f64,
}

/// A traced fiber: one coordinate polyline read from an annotation file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberTrace {
    /// Annotation entry name inside the per-image fiber bundle.
    pub name: String,
    /// Polyline vertices as (x, y) pixel coordinates.
    pub points: Vec<[f64; 2]>,
}

/// One element of an image batch.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub key: ImageKey,
    pub image: image::DynamicImage,
    pub fibers: Vec<FiberTrace>,
}

/// One element of a profile batch.
#[derive(Debug, Clone)]
pub struct ProfileRecord {
    pub key: ProfileKey,
    pub samples: Vec<ProfileSample>,
    /// Matching summary row(s) for the key.
    pub summary: Vec<SummaryRow>,
}
