//! Fuzz target for CVAT XML ingestion and instance assembly.
//!
//! Feeds arbitrary byte sequences through the XML reader and, when that
//! succeeds, through grouping and instance building, checking for panics,
//! crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use pepperset::conversion::{parse_image, ParseReport};
use pepperset::ir::io_cvat_xml::from_cvat_xml_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let mut report = ParseReport::new();
    if let Ok(images) = from_cvat_xml_slice(data, &mut report) {
        for image in &images {
            let _ = parse_image(image, &mut report);
        }
    }
});
