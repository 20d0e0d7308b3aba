//! Per-image training records produced from the annotation document.
//!
//! The shapes mirror the COCO keypoint schema (`images` and `annotations`
//! entries) so that downstream tooling written against COCO can consume them,
//! but they stay in memory; [`io_coco_json`](super::io_coco_json) renders the
//! on-disk flavor.

use serde::{Deserialize, Serialize};

use super::bbox::BBoxXYXY;
use super::ids::{GroupId, ImageId};
use super::space::Pixel;

/// Fixed keypoint and box layout of one pepper instance.
///
/// Both the instance builder and the COCO category definition read their
/// slot names from here, so the order below is the order of
/// [`InstanceAnnotation::keypoints`].
#[derive(Clone, Copy, Debug, Default)]
pub struct KeypointLayout;

impl KeypointLayout {
    /// Keypoint slot names, in output order.
    pub const KEYPOINT_NAMES: [&'static str; 5] = [
        "right_shoulder",
        "left_shoulder",
        "center_shoulder",
        "stem",
        "body",
    ];

    /// Box labels merged into the instance bounding box.
    pub const BOX_LABELS: [&'static str; 2] = ["stem", "body"];

    pub const NUM_BOX_LABELS: usize = Self::BOX_LABELS.len();

    /// Number of definable keypoint slots (COCO `num_keypoints`).
    pub const NUM_KEYPOINTS: usize = Self::KEYPOINT_NAMES.len();

    /// Every instance belongs to the single pepper category.
    pub const CATEGORY_ID: u64 = 1;

    pub const CATEGORY_NAME: &'static str = "pepper";

    /// Slot index for a point label, if the label names a keypoint.
    pub fn keypoint_slot(label: &str) -> Option<usize> {
        Self::KEYPOINT_NAMES.iter().position(|name| *name == label)
    }

    /// Slot index for a box label, if the label is one of the merged boxes.
    pub fn box_slot(label: &str) -> Option<usize> {
        Self::BOX_LABELS.iter().position(|name| *name == label)
    }
}

/// COCO keypoint visibility flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Visibility {
    /// Not labeled; the coordinates are meaningless.
    #[default]
    Unlabeled = 0,
    /// Labeled but occluded.
    LabeledHidden = 1,
    /// Labeled and visible.
    LabeledVisible = 2,
}

impl Visibility {
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Unlabeled),
            1 => Some(Self::LabeledHidden),
            2 => Some(Self::LabeledVisible),
            _ => None,
        }
    }
}

impl Serialize for Visibility {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Visibility {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u8::deserialize(deserializer)?;
        Visibility::from_u8(raw).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid visibility {raw}; expected 0, 1 or 2"))
        })
    }
}

/// One keypoint slot: `(x, y, visibility)`.
///
/// Serialized as the three-element list `[x, y, v]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Keypoint {
    pub x: f64,
    pub y: f64,
    pub visibility: Visibility,
}

impl Keypoint {
    /// A labeled, visible keypoint at `(x, y)`.
    pub fn visible(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            visibility: Visibility::LabeledVisible,
        }
    }

    /// The `(0, 0, unlabeled)` placeholder.
    pub fn unlabeled() -> Self {
        Self::default()
    }

    pub fn is_labeled(&self) -> bool {
        self.visibility != Visibility::Unlabeled
    }
}

impl Serialize for Keypoint {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (self.x, self.y, self.visibility).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Keypoint {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (x, y, visibility) = <(f64, f64, Visibility)>::deserialize(deserializer)?;
        Ok(Self { x, y, visibility })
    }
}

/// Metadata for one source image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub width: u32,
    pub height: u32,
    /// Image file name relative to the image directory.
    pub file_name: String,
    pub license: u32,
    pub flickr_url: String,
    pub coco_url: String,
    pub date_captured: Option<String>,
}

impl ImageRecord {
    /// Creates a record with the COCO bookkeeping fields left at their
    /// defaults (license 0, empty URLs, no capture date).
    pub fn new(
        id: impl Into<ImageId>,
        file_name: impl Into<String>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            file_name: file_name.into(),
            license: 0,
            flickr_url: String::new(),
            coco_url: String::new(),
            date_captured: None,
        }
    }
}

/// One pepper instance: composite bounding box plus the fixed keypoint set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceAnnotation {
    /// The CVAT group id the instance was assembled from.
    pub id: GroupId,
    pub image_id: ImageId,
    pub category_id: u64,
    /// Always `None`; peppers are annotated with boxes and points only.
    pub segmentation: Option<Vec<Vec<f64>>>,
    /// Area of `bbox`, not clamped. Malformed boxes show up as `<= 0`.
    pub area: f64,
    pub bbox: BBoxXYXY<Pixel>,
    pub iscrowd: u8,
    pub keypoints: [Keypoint; KeypointLayout::NUM_KEYPOINTS],
    /// Number of definable slots, not the number of labeled ones.
    /// See [`InstanceAnnotation::labeled_keypoints`] for the latter.
    pub num_keypoints: usize,
}

impl InstanceAnnotation {
    pub fn new(
        id: GroupId,
        image_id: ImageId,
        bbox: BBoxXYXY<Pixel>,
        keypoints: [Keypoint; KeypointLayout::NUM_KEYPOINTS],
    ) -> Self {
        Self {
            id,
            image_id,
            category_id: KeypointLayout::CATEGORY_ID,
            segmentation: None,
            area: bbox.area(),
            bbox,
            iscrowd: 0,
            keypoints,
            num_keypoints: KeypointLayout::NUM_KEYPOINTS,
        }
    }

    /// Looks up a keypoint by slot name.
    pub fn keypoint(&self, name: &str) -> Option<&Keypoint> {
        KeypointLayout::keypoint_slot(name).map(|slot| &self.keypoints[slot])
    }

    /// Number of slots that actually carry a label.
    pub fn labeled_keypoints(&self) -> usize {
        self.keypoints.iter().filter(|kp| kp.is_labeled()).count()
    }
}

/// Annotations of one image.
///
/// `None` means annotations could not be extracted for the image (its group
/// data was malformed); `Some(vec![])` means the image has no instances.
pub type ImageAnnotations = Option<Vec<InstanceAnnotation>>;
