//! Turns raw CVAT entries into per-image training records.
//!
//! The pipeline, leaf first:
//!
//! - [`extract_groups`]: distinct group ids of one image
//! - [`build_instance`]: one group's points and boxes merged into an
//!   [`InstanceAnnotation`]
//! - [`parse_image`]: image metadata plus all instances of one image
//! - [`parse_annotations`]: every image of a document, as parallel lists
//!
//! Recoverable problems never abort the pipeline. An image whose entries
//! lack group ids keeps its metadata and gets absent annotations (`None`);
//! a group without a stem or body box is skipped. Both are logged and
//! recorded in the [`ParseReport`].

pub mod report;

pub use report::{ParseCounts, ParseIssue, ParseIssueCode, ParseReport, ParseSeverity};

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, warn};

use crate::error::{GroupIdMissing, InstanceError, PepperError};
use crate::ir::io_cvat_xml;
use crate::ir::{
    BBoxXYXY, GroupId, ImageAnnotations, ImageRecord, InstanceAnnotation, Keypoint,
    KeypointLayout, Pixel, RawImage,
};

/// Parsed document: `images[i]` and `annotations[i]` describe the i-th
/// `<image>` element in document order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedAnnotations {
    pub images: Vec<ImageRecord>,
    pub annotations: Vec<ImageAnnotations>,
    pub report: ParseReport,
}

impl ParsedAnnotations {
    /// Number of images (equal to `annotations.len()`).
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterate over `(image, annotations)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&ImageRecord, &ImageAnnotations)> {
        self.images.iter().zip(self.annotations.iter())
    }

    /// Total number of instances across all images.
    pub fn instance_count(&self) -> usize {
        self.annotations.iter().flatten().map(Vec::len).sum()
    }
}

/// Parse the annotation document at `path` (file or directory holding
/// `annotations.xml`).
pub fn parse_annotations(path: &Path) -> Result<ParsedAnnotations, PepperError> {
    let mut report = ParseReport::new();
    let raw_images = io_cvat_xml::read_cvat_xml(path, &mut report)?;
    debug!(path = %path.display(), images = raw_images.len(), "read annotation document");
    Ok(assemble(&raw_images, report))
}

/// Parse an annotation document held in memory.
pub fn parse_annotations_str(xml: &str) -> Result<ParsedAnnotations, PepperError> {
    let mut report = ParseReport::new();
    let raw_images = io_cvat_xml::from_cvat_xml_str(xml, &mut report)?;
    Ok(assemble(&raw_images, report))
}

fn assemble(raw_images: &[RawImage], mut report: ParseReport) -> ParsedAnnotations {
    let mut images = Vec::with_capacity(raw_images.len());
    let mut annotations = Vec::with_capacity(raw_images.len());

    for raw in raw_images {
        let (image, anns) = parse_image(raw, &mut report);
        images.push(image);
        annotations.push(anns);
    }

    report.counts = ParseCounts {
        images: images.len(),
        instances: annotations.iter().flatten().map(Vec::len).sum(),
        images_without_annotations: annotations.iter().filter(|a| a.is_none()).count(),
    };

    ParsedAnnotations {
        images,
        annotations,
        report,
    }
}

/// Collect the distinct group ids of one image, in ascending order.
///
/// An image without entries yields an empty set. If any entry has no
/// readable group id the whole image is reported as [`GroupIdMissing`].
pub fn extract_groups(image: &RawImage) -> Result<BTreeSet<GroupId>, GroupIdMissing> {
    let missing = |element: &'static str, label: &str| GroupIdMissing {
        image_id: image.id,
        element,
        label: label.to_string(),
    };

    let mut groups = BTreeSet::new();
    for point in &image.points {
        groups.insert(point.group_id.ok_or_else(|| missing("points", &point.label))?);
    }
    for entry in &image.boxes {
        groups.insert(entry.group_id.ok_or_else(|| missing("box", &entry.label))?);
    }
    Ok(groups)
}

/// Merge the points and boxes of `group_id` into one instance.
///
/// Keypoint slots start as `(0, 0, unlabeled)`; each matching point sets its
/// slot to labeled-visible, later entries overwriting earlier ones. The
/// bounding box is the union of the stem and body boxes, or whichever of the
/// two exists. A group with neither fails with
/// [`InstanceError::NoBoundingBox`].
pub fn build_instance(
    group_id: GroupId,
    image: &RawImage,
) -> Result<InstanceAnnotation, InstanceError> {
    let mut keypoints = [Keypoint::unlabeled(); KeypointLayout::NUM_KEYPOINTS];
    let mut boxes: [Option<BBoxXYXY<Pixel>>; KeypointLayout::NUM_BOX_LABELS] =
        [None; KeypointLayout::NUM_BOX_LABELS];

    for point in image.points.iter().filter(|p| p.group_id == Some(group_id)) {
        if let Some(slot) = KeypointLayout::keypoint_slot(&point.label) {
            keypoints[slot] = Keypoint::visible(point.coordinate.x, point.coordinate.y);
        }
    }

    for entry in image.boxes.iter().filter(|b| b.group_id == Some(group_id)) {
        if let Some(slot) = KeypointLayout::box_slot(&entry.label) {
            boxes[slot] = Some(entry.corners);
        }
    }

    let bbox = match boxes {
        [Some(stem), Some(body)] => stem.union(&body),
        [Some(only), None] | [None, Some(only)] => only,
        [None, None] => {
            return Err(InstanceError::NoBoundingBox {
                image_id: image.id,
                group_id,
            })
        }
    };

    Ok(InstanceAnnotation::new(group_id, image.id, bbox, keypoints))
}

/// Build the record and instances of one image.
///
/// Returns `None` annotations when the image's group ids cannot be read.
/// Groups that fail to build are skipped; the remaining instances are kept.
pub fn parse_image(image: &RawImage, report: &mut ParseReport) -> (ImageRecord, ImageAnnotations) {
    let record = ImageRecord::new(image.id, image.name.clone(), image.width, image.height);

    note_unknown_labels(image, report);

    let groups = match extract_groups(image) {
        Ok(groups) => groups,
        Err(err) => {
            warn!(image = %image.id, "annotations unavailable: {err}");
            report.add(ParseIssue::warning(
                ParseIssueCode::GroupIdMissing,
                image.id,
                format!("{err}; annotations for this image are absent"),
            ));
            return (record, None);
        }
    };

    let mut instances = Vec::with_capacity(groups.len());
    for group_id in groups {
        match build_instance(group_id, image) {
            Ok(instance) => instances.push(instance),
            Err(err) => {
                warn!(image = %image.id, group = %group_id, "skipping instance: {err}");
                report.add(ParseIssue::warning(
                    ParseIssueCode::InstanceSkipped,
                    image.id,
                    err.to_string(),
                ));
            }
        }
    }

    (record, Some(instances))
}

fn note_unknown_labels(image: &RawImage, report: &mut ParseReport) {
    let unknown_points: BTreeSet<&str> = image
        .points
        .iter()
        .map(|p| p.label.as_str())
        .filter(|label| KeypointLayout::keypoint_slot(label).is_none())
        .collect();
    let unknown_boxes: BTreeSet<&str> = image
        .boxes
        .iter()
        .map(|b| b.label.as_str())
        .filter(|label| KeypointLayout::box_slot(label).is_none())
        .collect();

    for (element, labels) in [("points", unknown_points), ("box", unknown_boxes)] {
        for label in labels {
            debug!(image = %image.id, element, label, "label has no slot");
            report.add(ParseIssue::info(
                ParseIssueCode::UnknownLabel,
                image.id,
                format!("image {}: <{element}> label '{label}' has no slot and was ignored", image.id),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ImageId, RawBoxEntry, RawPointEntry, Visibility};

    fn point(label: &str, group: u64, x: f64, y: f64) -> RawPointEntry {
        RawPointEntry::new(label, Some(GroupId(group)), x, y)
    }

    fn bbox(label: &str, group: u64, xyxy: [f64; 4]) -> RawBoxEntry {
        let [x0, y0, x1, y1] = xyxy;
        RawBoxEntry::new(label, Some(GroupId(group)), BBoxXYXY::from_xyxy(x0, y0, x1, y1))
    }

    fn image() -> RawImage {
        RawImage::new(9u64, "img_0009.png", 640, 480)
    }

    #[test]
    fn extract_groups_collects_distinct_ids() {
        let img = image()
            .with_point(point("stem", 2, 1.0, 1.0))
            .with_point(point("body", 2, 2.0, 2.0))
            .with_box(bbox("body", 1, [0.0, 0.0, 5.0, 5.0]));

        let groups = extract_groups(&img).expect("groups");
        assert_eq!(groups.into_iter().collect::<Vec<_>>(), vec![GroupId(1), GroupId(2)]);
    }

    #[test]
    fn extract_groups_empty_image_is_empty_set() {
        assert!(extract_groups(&image()).expect("groups").is_empty());
    }

    #[test]
    fn extract_groups_reports_missing_group_id() {
        let img = image()
            .with_point(point("stem", 1, 1.0, 1.0))
            .with_box(RawBoxEntry::new("body", None, BBoxXYXY::default()));

        let err = extract_groups(&img).unwrap_err();
        assert_eq!(err.image_id, ImageId(9));
        assert_eq!(err.element, "box");
        assert_eq!(err.label, "body");
    }

    #[test]
    fn build_instance_merges_stem_and_body() {
        let img = image()
            .with_box(bbox("stem", 1, [0.0, 0.0, 10.0, 10.0]))
            .with_box(bbox("body", 1, [5.0, 5.0, 20.0, 20.0]));

        let ann = build_instance(GroupId(1), &img).expect("instance");
        assert_eq!(ann.bbox, BBoxXYXY::from_xyxy(0.0, 0.0, 20.0, 20.0));
        assert_eq!(ann.area, 400.0);
        assert_eq!(ann.id, GroupId(1));
        assert_eq!(ann.image_id, ImageId(9));
    }

    #[test]
    fn build_instance_single_box_is_used_verbatim() {
        let img = image().with_box(bbox("stem", 4, [3.0, 4.0, 8.0, 6.0]));
        let ann = build_instance(GroupId(4), &img).expect("instance");
        assert_eq!(ann.bbox, BBoxXYXY::from_xyxy(3.0, 4.0, 8.0, 6.0));
        assert_eq!(ann.area, 10.0);

        let img = image().with_box(bbox("body", 4, [1.0, 1.0, 2.0, 3.0]));
        let ann = build_instance(GroupId(4), &img).expect("instance");
        assert_eq!(ann.bbox, BBoxXYXY::from_xyxy(1.0, 1.0, 2.0, 3.0));
    }

    #[test]
    fn build_instance_without_box_fails() {
        let img = image().with_point(point("stem", 5, 1.0, 1.0));
        assert_eq!(
            build_instance(GroupId(5), &img).unwrap_err(),
            InstanceError::NoBoundingBox {
                image_id: ImageId(9),
                group_id: GroupId(5)
            }
        );
    }

    #[test]
    fn build_instance_ignores_other_groups_and_unknown_labels() {
        let img = image()
            .with_box(bbox("body", 1, [0.0, 0.0, 4.0, 4.0]))
            .with_box(bbox("stem", 2, [-50.0, -50.0, 100.0, 100.0]))
            .with_box(bbox("pepper", 1, [-10.0, -10.0, 40.0, 40.0]))
            .with_point(point("leaf", 1, 3.0, 3.0))
            .with_point(point("stem", 2, 3.0, 3.0));

        let ann = build_instance(GroupId(1), &img).expect("instance");
        assert_eq!(ann.bbox, BBoxXYXY::from_xyxy(0.0, 0.0, 4.0, 4.0));
        assert_eq!(ann.labeled_keypoints(), 0);
    }

    #[test]
    fn build_instance_fills_slots_in_fixed_order_last_write_wins() {
        let img = image()
            .with_box(bbox("body", 1, [0.0, 0.0, 50.0, 50.0]))
            .with_point(point("body", 1, 20.0, 30.0))
            .with_point(point("right_shoulder", 1, 1.0, 2.0))
            .with_point(point("right_shoulder", 1, 7.0, 8.0));

        let ann = build_instance(GroupId(1), &img).expect("instance");
        assert_eq!(ann.keypoints.len(), 5);
        assert_eq!(ann.num_keypoints, 5);
        assert_eq!(ann.keypoints[0], Keypoint::visible(7.0, 8.0));
        assert_eq!(ann.keypoints[1], Keypoint::unlabeled());
        assert_eq!(ann.keypoints[2].visibility, Visibility::Unlabeled);
        assert_eq!(ann.keypoints[3], Keypoint::unlabeled());
        assert_eq!(ann.keypoints[4], Keypoint::visible(20.0, 30.0));
        assert_eq!(ann.labeled_keypoints(), 2);
    }

    #[test]
    fn build_instance_duplicate_box_last_write_wins() {
        let img = image()
            .with_box(bbox("stem", 1, [0.0, 0.0, 100.0, 100.0]))
            .with_box(bbox("stem", 1, [1.0, 1.0, 2.0, 2.0]));
        let ann = build_instance(GroupId(1), &img).expect("instance");
        assert_eq!(ann.bbox, BBoxXYXY::from_xyxy(1.0, 1.0, 2.0, 2.0));
    }

    #[test]
    fn build_instance_passes_negative_area_through() {
        let img = image().with_box(bbox("body", 1, [10.0, 0.0, 0.0, 10.0]));
        let ann = build_instance(GroupId(1), &img).expect("instance");
        assert_eq!(ann.area, -100.0);
    }

    #[test]
    fn parse_image_skips_instance_without_box() {
        let img = image()
            .with_box(bbox("stem", 1, [0.0, 0.0, 10.0, 10.0]))
            .with_point(point("stem", 2, 5.0, 5.0))
            .with_box(bbox("body", 3, [20.0, 20.0, 30.0, 30.0]));
        let mut report = ParseReport::new();

        let (record, anns) = parse_image(&img, &mut report);
        assert_eq!(record.id, ImageId(9));
        assert_eq!(record.file_name, "img_0009.png");

        let anns = anns.expect("annotations present");
        assert_eq!(
            anns.iter().map(|a| a.id).collect::<Vec<_>>(),
            vec![GroupId(1), GroupId(3)]
        );
        assert_eq!(
            report
                .issues_with_code(ParseIssueCode::InstanceSkipped)
                .count(),
            1
        );
    }

    #[test]
    fn parse_image_empty_vs_malformed() {
        let mut report = ParseReport::new();
        let (_, empty) = parse_image(&image(), &mut report);
        assert_eq!(empty, Some(vec![]));
        assert!(report.issues.is_empty());

        let malformed = image()
            .with_box(bbox("stem", 1, [0.0, 0.0, 1.0, 1.0]))
            .with_point(RawPointEntry::new("body", None, 1.0, 1.0));
        let (record, absent) = parse_image(&malformed, &mut report);
        assert_eq!(absent, None);
        assert_eq!(record.width, 640);
        assert_eq!(
            report
                .issues_with_code(ParseIssueCode::GroupIdMissing)
                .count(),
            1
        );
    }

    #[test]
    fn parse_image_notes_unknown_labels_once() {
        let img = image()
            .with_box(bbox("pepper", 1, [0.0, 0.0, 1.0, 1.0]))
            .with_box(bbox("pepper", 2, [0.0, 0.0, 1.0, 1.0]))
            .with_box(bbox("stem", 1, [0.0, 0.0, 1.0, 1.0]));
        let mut report = ParseReport::new();
        parse_image(&img, &mut report);

        let notes: Vec<_> = report
            .issues_with_code(ParseIssueCode::UnknownLabel)
            .collect();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("'pepper'"));
        // group 2 has only the unknown "pepper" box
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn parse_annotations_str_keeps_parallel_lists() {
        let xml = r#"<annotations>
  <image id="0" name="a.png" width="10" height="10">
    <box label="stem" xtl="0" ytl="0" xbr="2" ybr="2" group_id="1"/>
  </image>
  <image id="1" name="b.png" width="10" height="10">
    <box label="stem" xtl="0" ytl="0" xbr="2" ybr="2"/>
  </image>
  <image id="2" name="c.png" width="10" height="10"/>
</annotations>"#;
        let parsed = parse_annotations_str(xml).expect("parse");

        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.images.len(), parsed.annotations.len());
        assert_eq!(parsed.annotations[0].as_ref().map(Vec::len), Some(1));
        assert_eq!(parsed.annotations[1], None);
        assert_eq!(parsed.annotations[2], Some(vec![]));
        assert_eq!(parsed.instance_count(), 1);
        assert_eq!(
            parsed.report.counts,
            ParseCounts {
                images: 3,
                instances: 1,
                images_without_annotations: 1,
            }
        );
    }

    #[test]
    fn parse_annotations_str_does_not_merge_non_finite_box() {
        let xml = r#"<annotations>
  <image id="0" name="a.png" width="40" height="40">
    <box label="stem" xtl="nan" ytl="nan" xbr="nan" ybr="nan" group_id="1"/>
    <box label="body" xtl="5" ytl="5" xbr="20" ybr="20" group_id="1"/>
  </image>
</annotations>"#;
        let parsed = parse_annotations_str(xml).expect("parse");

        let instances = parsed.annotations[0].as_ref().expect("instances");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].bbox, BBoxXYXY::from_xyxy(5.0, 5.0, 20.0, 20.0));
        assert_eq!(
            parsed
                .report
                .issues_with_code(ParseIssueCode::MalformedEntry)
                .count(),
            1
        );
        assert!(parsed.report.is_lossy());
    }
}
