//! Format 1 to Format 0 MIDI converter

use clap::Parser;
use fil2mid::batch::{collect_files, BatchSummary, Outcome};
use fil2mid::cli::Verbosity;
use fil2mid::smf::{convert_file, Conversion};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "convert_midi_type")]
#[command(version = "0.1.0")]
#[command(about = "Merge multi-track MIDI files into a single Format 0 track", long_about = None)]
struct Args {
    /// MIDI file or directory
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output file (single file only; default: overwrite the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Do not keep <file>.backup when overwriting
    #[arg(long)]
    no_backup: bool,

    /// Merge files that have more than one track
    #[arg(short, long)]
    force: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn main() -> Result<(), fil2mid::Error> {
    let args = Args::parse();
    args.verbosity.init();

    let files = if args.input.is_dir() {
        if args.output.is_some() {
            warn!("--output is ignored for directories");
        }
        collect_files(&args.input, &["mid", "midi"], args.recursive)?
    } else {
        vec![args.input.clone()]
    };

    let output = if args.input.is_dir() {
        None
    } else {
        args.output.as_deref()
    };

    let mut summary = BatchSummary::new();
    let (mut already, mut refused) = (0, 0);
    for file in &files {
        let outcome = match convert_file(file, output, !args.no_backup, args.force) {
            Ok(Conversion::Converted(_)) => Outcome::Done,
            Ok(Conversion::AlreadySingleTrack) => {
                already += 1;
                Outcome::Skipped("already Format 0".into())
            }
            Ok(Conversion::Refused { tracks }) => {
                refused += 1;
                Outcome::Skipped(format!("{} tracks, use --force to merge", tracks))
            }
            Err(e) => Outcome::Failed(e),
        };
        summary.record(file, outcome);
    }

    if files.len() > 1 {
        info!(
            "Converted: {}, already Format 0: {}, refused: {}, errors: {}",
            summary.done, already, refused, summary.failed
        );
    }

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
