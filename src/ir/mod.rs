//! Intermediate representation for pepperset.
//!
//! Two layers live here:
//!
//! 1. **Raw entries** ([`RawImage`], [`RawPointEntry`], [`RawBoxEntry`]):
//!    typed copies of the CVAT `<image>`, `<points>` and `<box>` elements,
//!    produced by [`io_cvat_xml`] and consumed once by
//!    [`conversion`](crate::conversion).
//!
//! 2. **Records** ([`ImageRecord`], [`InstanceAnnotation`]): the per-image
//!    training records, shaped like COCO keypoint entries.
//!
//! Geometry uses a single canonical system, XYXY in pixel space, and is
//! permissive: a box with min > max is representable so that malformed
//! source boxes stay observable.
//!
//! # Example
//!
//! ```
//! use pepperset::ir::{BBoxXYXY, GroupId, ImageId, InstanceAnnotation, Keypoint, KeypointLayout, Pixel};
//!
//! let instance = InstanceAnnotation::new(
//!     GroupId(1),
//!     ImageId(0),
//!     BBoxXYXY::<Pixel>::from_xyxy(10.0, 20.0, 100.0, 200.0),
//!     [Keypoint::unlabeled(); KeypointLayout::NUM_KEYPOINTS],
//! );
//! assert_eq!(instance.area, 90.0 * 180.0);
//! ```

mod bbox;
mod coord;
mod ids;
pub mod io_coco_json;
pub mod io_cvat_xml;
mod model;
mod raw;
mod space;

// Re-export core types for convenient access
pub use bbox::BBoxXYXY;
pub use coord::Coord;
pub use ids::{GroupId, ImageId};
pub use model::{
    ImageAnnotations, ImageRecord, InstanceAnnotation, Keypoint, KeypointLayout, Visibility,
};
pub use raw::{RawBoxEntry, RawImage, RawPointEntry};
pub use space::Pixel;
