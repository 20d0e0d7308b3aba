//! CVAT XML reader.
//!
//! This adapter reads CVAT "for images" task-export XML:
//! - single `annotations.xml` file (or a directory containing one)
//! - root `<annotations>` containing `<image>` entries
//! - `<points>` (one `x,y` pair) and `<box>` elements tied together by `group_id`
//!
//! Image metadata is required; a broken `<image>` element makes the whole
//! document unreadable. Individual `<points>`/`<box>` elements that cannot be
//! read are skipped and recorded in the [`ParseReport`].

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};
use tracing::{debug, warn};

use super::raw::{RawBoxEntry, RawImage, RawPointEntry};
use super::{BBoxXYXY, GroupId, ImageId, Pixel};
use crate::conversion::report::{ParseIssue, ParseIssueCode, ParseReport};
use crate::error::PepperError;

const CVAT_XML_FILE_NAME: &str = "annotations.xml";

/// Read a CVAT XML file or directory containing `annotations.xml`.
///
/// Images are returned in document order.
pub fn read_cvat_xml(path: &Path, report: &mut ParseReport) -> Result<Vec<RawImage>, PepperError> {
    let resolved = resolve_cvat_xml_path(path)?;
    let xml = fs::read_to_string(&resolved).map_err(|source| PepperError::DocumentUnreadable {
        path: resolved.clone(),
        message: source.to_string(),
    })?;
    parse_cvat_xml_str(&xml, &resolved, report)
}

/// Parse CVAT XML from a string.
pub fn from_cvat_xml_str(xml: &str, report: &mut ParseReport) -> Result<Vec<RawImage>, PepperError> {
    parse_cvat_xml_str(xml, Path::new("<string>"), report)
}

/// Parse CVAT XML from bytes (must be valid UTF-8).
pub fn from_cvat_xml_slice(
    bytes: &[u8],
    report: &mut ParseReport,
) -> Result<Vec<RawImage>, PepperError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| PepperError::DocumentUnreadable {
        path: PathBuf::from("<bytes>"),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    parse_cvat_xml_str(xml, Path::new("<bytes>"), report)
}

fn parse_cvat_xml_str(
    xml: &str,
    path: &Path,
    report: &mut ParseReport,
) -> Result<Vec<RawImage>, PepperError> {
    let document = Document::parse(xml).map_err(|source| unreadable(path, source.to_string()))?;

    let root = document.root_element();
    if root.tag_name().name() != "annotations" {
        return Err(unreadable(path, "missing <annotations> root element"));
    }

    root.children()
        .filter(|n| n.is_element() && n.tag_name().name() == "image")
        .map(|image_node| parse_image_element(image_node, path, report))
        .collect()
}

fn parse_image_element(
    node: Node<'_, '_>,
    path: &Path,
    report: &mut ParseReport,
) -> Result<RawImage, PepperError> {
    let id = ImageId::new(parse_required_attr::<u64>(node, "id", path)?);
    let name = required_attr(node, "name", path, "<image>")?.to_string();
    let width = parse_required_attr::<u32>(node, "width", path)?;
    let height = parse_required_attr::<u32>(node, "height", path)?;

    let mut image = RawImage::new(id, name, width, height);

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "points" => match parse_points_element(child) {
                Ok(point) => image.points.push(point),
                Err(message) => skip_entry(report, id, "points", message),
            },
            "box" => match parse_box_element(child) {
                Ok(entry) => image.boxes.push(entry),
                Err(message) => skip_entry(report, id, "box", message),
            },
            other => {
                debug!(image = %id, element = other, "ignoring unsupported annotation element");
                report.add(ParseIssue::info(
                    ParseIssueCode::UnsupportedElement,
                    id,
                    format!("image {id}: ignored unsupported element <{other}>"),
                ));
            }
        }
    }

    Ok(image)
}

fn parse_points_element(node: Node<'_, '_>) -> Result<RawPointEntry, String> {
    let label = entry_label(node)?;
    let raw = node
        .attribute("points")
        .ok_or_else(|| format!("<points label=\"{label}\"> has no 'points' attribute"))?;

    // Only the first pair is used; a single keypoint is one pair.
    let first = raw.split(';').next().unwrap_or("");
    let (x, y) = first
        .split_once(',')
        .and_then(|(x, y)| Some((x.trim().parse::<f64>().ok()?, y.trim().parse::<f64>().ok()?)))
        .ok_or_else(|| {
            format!("<points label=\"{label}\"> has invalid points='{raw}'; expected 'x,y'")
        })?;

    let entry = RawPointEntry::new(label, group_id_attr(node), x, y);
    if !entry.coordinate.is_finite() {
        return Err(format!(
            "<points label=\"{}\"> has non-finite coordinates '{raw}'",
            entry.label
        ));
    }
    Ok(entry)
}

fn parse_box_element(node: Node<'_, '_>) -> Result<RawBoxEntry, String> {
    let label = entry_label(node)?;
    let mut corners = [0.0f64; 4];
    for (slot, attr) in corners.iter_mut().zip(["xtl", "ytl", "xbr", "ybr"]) {
        let raw = node
            .attribute(attr)
            .ok_or_else(|| format!("<box label=\"{label}\"> has no '{attr}' attribute"))?;
        *slot = raw.trim().parse::<f64>().map_err(|_| {
            format!("<box label=\"{label}\"> has invalid {attr}='{raw}'; expected floating-point number")
        })?;
    }
    let [xtl, ytl, xbr, ybr] = corners;
    let corners = BBoxXYXY::<Pixel>::from_xyxy(xtl, ytl, xbr, ybr);
    if !corners.is_finite() {
        return Err(format!(
            "<box label=\"{label}\"> has non-finite coordinates {:?}",
            corners.to_array()
        ));
    }

    Ok(RawBoxEntry::new(label, group_id_attr(node), corners))
}

fn entry_label(node: Node<'_, '_>) -> Result<String, String> {
    node.attribute("label")
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(ToOwned::to_owned)
        .ok_or_else(|| format!("<{}> has no label", node.tag_name().name()))
}

/// A missing or non-integer `group_id` is kept as `None`; the group
/// extractor decides what that means for the image.
fn group_id_attr(node: Node<'_, '_>) -> Option<GroupId> {
    node.attribute("group_id")
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(GroupId::new)
}

fn skip_entry(report: &mut ParseReport, image_id: ImageId, element: &str, message: String) {
    warn!(image = %image_id, element, "skipping malformed entry: {message}");
    report.add(ParseIssue::warning(
        ParseIssueCode::MalformedEntry,
        image_id,
        format!("image {image_id}: skipped {message}"),
    ));
}

fn resolve_cvat_xml_path(path: &Path) -> Result<PathBuf, PepperError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }

    if !path.is_dir() {
        return Err(unreadable(path, "no such file or directory"));
    }

    let candidate = path.join(CVAT_XML_FILE_NAME);
    if candidate.is_file() {
        return Ok(candidate);
    }

    Err(unreadable(
        path,
        format!("expected '{CVAT_XML_FILE_NAME}' at directory root"),
    ))
}

fn unreadable(path: &Path, message: impl Into<String>) -> PepperError {
    PepperError::DocumentUnreadable {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn required_attr<'a>(
    node: Node<'a, '_>,
    attr: &str,
    path: &Path,
    context: &str,
) -> Result<&'a str, PepperError> {
    node.attribute(attr)
        .ok_or_else(|| unreadable(path, format!("missing '{attr}' attribute in {context}")))
}

fn parse_required_attr<T: std::str::FromStr>(
    node: Node<'_, '_>,
    attr: &str,
    path: &Path,
) -> Result<T, PepperError> {
    let raw = required_attr(node, attr, path, "<image>")?;
    raw.trim().parse::<T>().map_err(|_| {
        unreadable(
            path,
            format!(
                "invalid '{attr}' value '{raw}' in <image>; expected {}",
                std::any::type_name::<T>()
            ),
        )
    })
}
