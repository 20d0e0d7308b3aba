use std::path::PathBuf;
use thiserror::Error;

use crate::ir::{GroupId, ImageId};

/// The main error type for pepperset operations.
///
/// Every variant here is fatal for the call that returned it. Problems that
/// only affect one image or one instance are reported through
/// [`GroupIdMissing`] and [`InstanceError`] and recovered from by the parser.
#[derive(Debug, Error)]
pub enum PepperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read annotation document {path}: {message}")]
    DocumentUnreadable { path: PathBuf, message: String },

    #[error("Image file not found: {path}")]
    ImageFileMissing { path: PathBuf },

    #[error("Failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Index {index} out of range for dataset of {len} image(s)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Failed to serialize JSON: {0}")]
    JsonWrite(#[from] serde_json::Error),

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),
}

/// An entry of the image has no readable `group_id`.
///
/// The image keeps its metadata but its annotations are marked absent.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("image {image_id}: <{element} label=\"{label}\"> has no readable group_id")]
pub struct GroupIdMissing {
    pub image_id: ImageId,
    pub element: &'static str,
    pub label: String,
}

/// A group's entries could not be assembled into an instance.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("image {image_id}, group {group_id}: no stem or body box for instance")]
    NoBoundingBox { image_id: ImageId, group_id: GroupId },
}
