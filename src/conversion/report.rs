//! Parse report types for tracking skipped entries and recovered failures.
//!
//! Nothing the parser recovers from is dropped silently: every skipped entry,
//! skipped instance and image with absent annotations leaves an issue here.

use serde::Serialize;
use std::fmt;

use crate::ir::ImageId;

/// A report generated while turning an annotation document into records.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ParseReport {
    /// Element counts of the parsed output.
    pub counts: ParseCounts,
    /// Issues discovered during ingestion and instance assembly.
    pub issues: Vec<ParseIssue>,
}

impl ParseReport {
    /// Create a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue to the report.
    pub fn add(&mut self, issue: ParseIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (data that did not make it into a record).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ParseSeverity::Warning)
            .count()
    }

    /// Count of info-level issues.
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ParseSeverity::Info)
            .count()
    }

    /// Returns true if any source data was dropped.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    /// Issues with the given code.
    pub fn issues_with_code(&self, code: ParseIssueCode) -> impl Iterator<Item = &ParseIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

impl fmt::Display for ParseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  {} images, {} instances",
            self.counts.images, self.counts.instances
        )?;
        if self.counts.images_without_annotations > 0 {
            writeln!(
                f,
                "  {} image(s) with absent annotations",
                self.counts.images_without_annotations
            )?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ParseSeverity::Warning)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({}):", infos)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ParseSeverity::Info)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// Counts of parsed elements.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParseCounts {
    pub images: usize,
    pub instances: usize,
    pub images_without_annotations: usize,
}

/// A single issue discovered while parsing.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ParseIssue {
    pub severity: ParseSeverity,
    pub code: ParseIssueCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<ImageId>,
    pub message: String,
}

impl ParseIssue {
    /// Create a warning-level issue (source data was dropped).
    pub fn warning(
        code: ParseIssueCode,
        image_id: impl Into<Option<ImageId>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ParseSeverity::Warning,
            code,
            image_id: image_id.into(),
            message: message.into(),
        }
    }

    /// Create an info-level issue.
    pub fn info(
        code: ParseIssueCode,
        image_id: impl Into<Option<ImageId>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity: ParseSeverity::Info,
            code,
            image_id: image_id.into(),
            message: message.into(),
        }
    }
}

/// Severity level for parse issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseSeverity {
    Warning,
    Info,
}

/// Stable issue codes for programmatic consumption.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseIssueCode {
    /// A `<points>` or `<box>` element lacked a label or had unreadable coordinates.
    MalformedEntry,
    /// A label that does not map to any keypoint or box slot.
    UnknownLabel,
    /// An annotation element other than `<points>` or `<box>`.
    UnsupportedElement,
    /// An entry had no readable group id; the image's annotations are absent.
    GroupIdMissing,
    /// A group had no stem or body box; the instance was skipped.
    InstanceSkipped,
}
