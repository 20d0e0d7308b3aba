//! Indexed, read-only view over a parsed annotation document.
//!
//! The document is parsed eagerly when the dataset is opened; pixel data is
//! read from the image directory on every [`PepperDataset::get`] call and is
//! not cached.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conversion::{self, ParseReport, ParsedAnnotations};
use crate::error::PepperError;
use crate::ir::{ImageAnnotations, ImageRecord};

/// Where a dataset reads its annotations and images from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// CVAT XML file, or a directory containing `annotations.xml`.
    pub annotations_source: PathBuf,
    /// Directory that image `file_name`s are resolved against.
    pub image_directory: PathBuf,
}

impl DatasetConfig {
    pub fn new(annotations_source: impl Into<PathBuf>, image_directory: impl Into<PathBuf>) -> Self {
        Self {
            annotations_source: annotations_source.into(),
            image_directory: image_directory.into(),
        }
    }
}

/// Applied to every decoded image before it is returned.
pub type PixelTransform = Box<dyn Fn(DynamicImage) -> DynamicImage>;

/// Applied to every annotation list (absent or not) before it is returned.
pub type AnnotationTransform = Box<dyn Fn(ImageAnnotations) -> ImageAnnotations>;

/// One item of the dataset.
#[derive(Clone, Debug)]
pub struct Sample {
    pub image: DynamicImage,
    pub annotations: ImageAnnotations,
}

/// Pepper keypoint dataset: `(image, annotations)` pairs by index.
pub struct PepperDataset {
    image_directory: PathBuf,
    parsed: ParsedAnnotations,
    pixel_transform: Option<PixelTransform>,
    annotation_transform: Option<AnnotationTransform>,
}

impl PepperDataset {
    /// Parse the annotation document and set up the view.
    pub fn open(config: &DatasetConfig) -> Result<Self, PepperError> {
        let parsed = conversion::parse_annotations(&config.annotations_source)?;
        info!(
            source = %config.annotations_source.display(),
            images = parsed.len(),
            instances = parsed.instance_count(),
            warnings = parsed.report.warning_count(),
            "opened pepper dataset"
        );
        Ok(Self::from_parsed(parsed, &config.image_directory))
    }

    /// Wrap already-parsed annotations.
    pub fn from_parsed(parsed: ParsedAnnotations, image_directory: impl Into<PathBuf>) -> Self {
        Self {
            image_directory: image_directory.into(),
            parsed,
            pixel_transform: None,
            annotation_transform: None,
        }
    }

    pub fn with_pixel_transform(
        mut self,
        transform: impl Fn(DynamicImage) -> DynamicImage + 'static,
    ) -> Self {
        self.pixel_transform = Some(Box::new(transform));
        self
    }

    pub fn with_annotation_transform(
        mut self,
        transform: impl Fn(ImageAnnotations) -> ImageAnnotations + 'static,
    ) -> Self {
        self.annotation_transform = Some(Box::new(transform));
        self
    }

    /// Number of images in the document.
    pub fn len(&self) -> usize {
        self.parsed.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn images(&self) -> &[ImageRecord] {
        &self.parsed.images
    }

    pub fn annotations(&self) -> &[ImageAnnotations] {
        &self.parsed.annotations
    }

    /// Issues recorded while parsing the document.
    pub fn report(&self) -> &ParseReport {
        &self.parsed.report
    }

    pub fn image_directory(&self) -> &Path {
        &self.image_directory
    }

    /// On-disk path of the image at `index`.
    pub fn image_path(&self, index: usize) -> Result<PathBuf, PepperError> {
        let image = self.record(index)?;
        Ok(self.image_directory.join(&image.file_name))
    }

    /// Load the image at `index` and pair it with its annotations.
    pub fn get(&self, index: usize) -> Result<Sample, PepperError> {
        let path = self.image_path(index)?;
        debug!(index, path = %path.display(), "loading sample");

        let mut image = load_image(&path)?;
        if let Some(transform) = &self.pixel_transform {
            image = transform(image);
        }

        let mut annotations = self.parsed.annotations[index].clone();
        if let Some(transform) = &self.annotation_transform {
            annotations = transform(annotations);
        }

        Ok(Sample { image, annotations })
    }

    /// Iterate over all samples in index order.
    pub fn iter(&self) -> impl Iterator<Item = Result<Sample, PepperError>> + '_ {
        (0..self.len()).map(move |index| self.get(index))
    }

    fn record(&self, index: usize) -> Result<&ImageRecord, PepperError> {
        self.parsed
            .images
            .get(index)
            .ok_or(PepperError::IndexOutOfRange {
                index,
                len: self.len(),
            })
    }
}

impl fmt::Debug for PepperDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PepperDataset")
            .field("image_directory", &self.image_directory)
            .field("len", &self.len())
            .field("pixel_transform", &self.pixel_transform.is_some())
            .field("annotation_transform", &self.annotation_transform.is_some())
            .finish()
    }
}

fn load_image(path: &Path) -> Result<DynamicImage, PepperError> {
    let missing = || PepperError::ImageFileMissing {
        path: path.to_path_buf(),
    };
    if !path.is_file() {
        return Err(missing());
    }

    let reader = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(|source| match source.kind() {
            ErrorKind::NotFound => missing(),
            _ => PepperError::Io(source),
        })?;

    reader.decode().map_err(|source| PepperError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })
}
