#![allow(dead_code)]

use std::fmt::Write as _;

use pepperset::ir::{BBoxXYXY, GroupId, ImageId, KeypointLayout, RawBoxEntry, RawImage, RawPointEntry};
use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

fn arb_point_label() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => proptest::sample::select(KeypointLayout::KEYPOINT_NAMES.to_vec()),
        1 => Just("leaf"),
    ]
    .prop_map(str::to_string)
}

fn arb_box_label() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => proptest::sample::select(KeypointLayout::BOX_LABELS.to_vec()),
        1 => Just("pepper"),
    ]
    .prop_map(str::to_string)
}

fn arb_coord() -> impl Strategy<Value = f64> {
    // quarter-pixel grid keeps the values exact through text formatting
    (-400i32..4000).prop_map(|v| f64::from(v) / 4.0)
}

fn arb_group(max_group: u64) -> impl Strategy<Value = Option<GroupId>> {
    (1..=max_group).prop_map(|g| Some(GroupId(g)))
}

pub fn arb_point(max_group: u64) -> impl Strategy<Value = RawPointEntry> {
    (arb_point_label(), arb_group(max_group), arb_coord(), arb_coord())
        .prop_map(|(label, group, x, y)| RawPointEntry::new(label, group, x, y))
}

pub fn arb_box(max_group: u64) -> impl Strategy<Value = RawBoxEntry> {
    (
        arb_box_label(),
        arb_group(max_group),
        arb_coord(),
        arb_coord(),
        arb_coord(),
        arb_coord(),
    )
        .prop_map(|(label, group, x0, y0, x1, y1)| {
            RawBoxEntry::new(label, group, BBoxXYXY::from_xyxy(x0, y0, x1, y1))
        })
}

/// Images whose entries all carry a group id.
pub fn arb_image(id: u64, max_entries: usize, max_group: u64) -> impl Strategy<Value = RawImage> {
    (
        proptest::collection::vec(arb_point(max_group), 0..=max_entries),
        proptest::collection::vec(arb_box(max_group), 0..=max_entries),
    )
        .prop_map(move |(points, boxes)| {
            let mut image = RawImage::new(id, format!("img_{id:04}.png"), 640, 480);
            image.points = points;
            image.boxes = boxes;
            image
        })
}

pub fn arb_images(max_images: usize) -> impl Strategy<Value = Vec<RawImage>> {
    (0..=max_images).prop_flat_map(|n| {
        (0..n as u64)
            .map(|id| arb_image(id, 6, 4).boxed())
            .collect::<Vec<_>>()
    })
}

/// Render raw images as a CVAT XML document.
pub fn to_cvat_xml(images: &[RawImage]) -> String {
    let mut xml = String::new();
    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotations>").expect("write to string");
    for image in images {
        writeln!(
            xml,
            "  <image id=\"{}\" name=\"{}\" width=\"{}\" height=\"{}\">",
            image.id, image.name, image.width, image.height
        )
        .expect("write to string");
        for point in &image.points {
            writeln!(
                xml,
                "    <points label=\"{}\" points=\"{},{}\"{}/>",
                point.label,
                point.coordinate.x,
                point.coordinate.y,
                group_attr(point.group_id)
            )
            .expect("write to string");
        }
        for entry in &image.boxes {
            writeln!(
                xml,
                "    <box label=\"{}\" xtl=\"{}\" ytl=\"{}\" xbr=\"{}\" ybr=\"{}\"{}/>",
                entry.label,
                entry.corners.xmin(),
                entry.corners.ymin(),
                entry.corners.xmax(),
                entry.corners.ymax(),
                group_attr(entry.group_id)
            )
            .expect("write to string");
        }
        writeln!(xml, "  </image>").expect("write to string");
    }
    writeln!(xml, "</annotations>").expect("write to string");
    xml
}

fn group_attr(group_id: Option<GroupId>) -> String {
    group_id
        .map(|g| format!(" group_id=\"{g}\""))
        .unwrap_or_default()
}

pub fn image_id(image: &RawImage) -> ImageId {
    image.id
}
