//! Typed records for the entries of one CVAT `<image>` element.
//!
//! These are read once at document ingestion and dropped after the image has
//! been turned into [`InstanceAnnotation`](super::InstanceAnnotation)s.

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::ids::{GroupId, ImageId};
use super::space::Pixel;

/// A labeled `<points>` element.
#[derive(Clone, Debug, PartialEq)]
pub struct RawPointEntry {
    pub label: String,
    /// `None` when the `group_id` attribute is absent or not an integer.
    pub group_id: Option<GroupId>,
    pub coordinate: Coord<Pixel>,
}

impl RawPointEntry {
    pub fn new(label: impl Into<String>, group_id: Option<GroupId>, x: f64, y: f64) -> Self {
        Self {
            label: label.into(),
            group_id,
            coordinate: Coord::new(x, y),
        }
    }
}

/// A labeled `<box>` element.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBoxEntry {
    pub label: String,
    /// `None` when the `group_id` attribute is absent or not an integer.
    pub group_id: Option<GroupId>,
    pub corners: BBoxXYXY<Pixel>,
}

impl RawBoxEntry {
    pub fn new(
        label: impl Into<String>,
        group_id: Option<GroupId>,
        corners: BBoxXYXY<Pixel>,
    ) -> Self {
        Self {
            label: label.into(),
            group_id,
            corners,
        }
    }
}

/// One `<image>` element: metadata plus its entries in document order.
#[derive(Clone, Debug, PartialEq)]
pub struct RawImage {
    pub id: ImageId,
    pub width: u32,
    pub height: u32,
    pub name: String,
    pub points: Vec<RawPointEntry>,
    pub boxes: Vec<RawBoxEntry>,
}

impl RawImage {
    pub fn new(id: impl Into<ImageId>, name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            name: name.into(),
            points: Vec::new(),
            boxes: Vec::new(),
        }
    }

    pub fn with_point(mut self, point: RawPointEntry) -> Self {
        self.points.push(point);
        self
    }

    pub fn with_box(mut self, entry: RawBoxEntry) -> Self {
        self.boxes.push(entry);
        self
    }

    /// True if the image carries no point or box entries.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty() && self.boxes.is_empty()
    }
}
