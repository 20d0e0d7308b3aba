//! Coordinate space marker types.
//!
//! Zero-sized types used as type parameters so that geometry from different
//! coordinate systems cannot be mixed at compile time.

use std::fmt;

/// Marker type for pixel coordinates (absolute values).
///
/// CVAT writes every point and box in this space, with (0, 0) at the
/// top-left corner of the image.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}
