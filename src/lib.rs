//! Pepperset: CVAT pepper annotations to keypoint training records.
//!
//! Pepperset reads a CVAT "for images" XML export in which every pepper is
//! annotated with up to five keypoints (`<points>`) and a `stem` and/or
//! `body` box (`<box>`), all tied together by a shared `group_id`. It turns
//! each group into one COCO-style keypoint annotation and exposes the result
//! as an indexed dataset of `(image, annotations)` pairs.
//!
//! # Modules
//!
//! - [`ir`]: raw entry and record types, CVAT reader, COCO keypoint writer
//! - [`conversion`]: grouping and instance assembly, parse report
//! - [`dataset`]: indexed dataset over the parsed records and image files
//! - [`error`]: error types for pepperset operations
//!
//! # Example
//!
//! ```no_run
//! use pepperset::dataset::{DatasetConfig, PepperDataset};
//!
//! let dataset = PepperDataset::open(&DatasetConfig::new("annotations.xml", "images"))?;
//! let sample = dataset.get(0)?;
//! println!("{}x{}", sample.image.width(), sample.image.height());
//! # Ok::<(), pepperset::PepperError>(())
//! ```

pub mod conversion;
pub mod dataset;
pub mod error;
pub mod ir;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use conversion::{parse_annotations, ParseReport, ParsedAnnotations};
pub use dataset::{DatasetConfig, PepperDataset, Sample};
pub use error::PepperError;

/// The pepperset CLI application.
#[derive(Parser)]
#[command(name = "pepperset")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Parse an annotation document and report counts and skipped data.
    Summary(SummaryArgs),
    /// Load one sample and print its image size and annotations.
    Show(ShowArgs),
    /// Print the parsed records as COCO keypoint JSON.
    Coco(CocoArgs),
}

/// Arguments for the summary subcommand.
#[derive(clap::Args)]
struct SummaryArgs {
    /// CVAT XML file or directory containing annotations.xml.
    annotations: PathBuf,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the show subcommand.
#[derive(clap::Args)]
struct ShowArgs {
    /// CVAT XML file or directory containing annotations.xml.
    annotations: PathBuf,

    /// Directory containing the image files.
    #[arg(long, env = "PEPPERSET_IMAGE_DIR")]
    images: PathBuf,

    /// Index of the sample to load.
    #[arg(long, default_value_t = 0)]
    index: usize,
}

/// Arguments for the coco subcommand.
#[derive(clap::Args)]
struct CocoArgs {
    /// CVAT XML file or directory containing annotations.xml.
    annotations: PathBuf,
}

/// Run the pepperset CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), PepperError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Summary(args)) => run_summary(args),
        Some(Commands::Show(args)) => run_show(args),
        Some(Commands::Coco(args)) => run_coco(args),
        None => {
            println!("pepperset {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("CVAT pepper annotations to keypoint training records.");
            println!();
            println!("Run 'pepperset --help' for usage information.");
            Ok(())
        }
    }
}

fn run_summary(args: SummaryArgs) -> Result<(), PepperError> {
    let parsed = parse_annotations(&args.annotations)?;

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&parsed.report)?),
        "text" => {
            println!("Parsed {}:", args.annotations.display());
            print!("{}", parsed.report);
            if parsed.report.is_lossy() {
                println!("Some source annotations were dropped; see warnings above.");
            }
        }
        other => {
            return Err(PepperError::UnsupportedFormat(format!(
                "'{}' (supported: text, json)",
                other
            )));
        }
    }
    Ok(())
}

fn run_show(args: ShowArgs) -> Result<(), PepperError> {
    let dataset = PepperDataset::open(&DatasetConfig::new(&args.annotations, &args.images))?;
    let sample = dataset.get(args.index)?;
    let record = &dataset.images()[args.index];

    println!(
        "image {} ({}): {}x{} {:?}",
        record.id,
        record.file_name,
        sample.image.width(),
        sample.image.height(),
        sample.image.color()
    );
    match &sample.annotations {
        Some(anns) => println!("{} instance(s)", anns.len()),
        None => println!("annotations absent"),
    }
    println!("{}", serde_json::to_string_pretty(&sample.annotations)?);
    Ok(())
}

fn run_coco(args: CocoArgs) -> Result<(), PepperError> {
    let parsed = parse_annotations(&args.annotations)?;
    let mut stdout = std::io::stdout().lock();
    ir::io_coco_json::write_coco_keypoints(&mut stdout, &parsed.images, &parsed.annotations)?;
    writeln!(stdout)?;
    Ok(())
}
