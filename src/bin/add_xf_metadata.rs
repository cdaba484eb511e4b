//! Tag Format 0 MIDI files with XF solo metadata

use clap::Parser;
use fil2mid::backup::write_with_backup;
use fil2mid::batch::{collect_files, BatchSummary, Outcome};
use fil2mid::cli::Verbosity;
use fil2mid::smf::xf::{add_solo_metadata, current_year, XfOutcome};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "add_xf_metadata")]
#[command(version = "0.1.0")]
#[command(about = "Add the XF markers that mark a file as solo piano", long_about = None)]
struct Args {
    /// MIDI file or directory
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output file (single file only; default: overwrite the input)
    output: Option<PathBuf>,

    /// Copyright year (default: current year)
    #[arg(long)]
    year: Option<u16>,

    /// Do not scan subdirectories
    #[arg(long)]
    no_recursive: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn tag(input: &Path, output: Option<&Path>, year: u16) -> Outcome {
    let result = fs::read(input)
        .map_err(fil2mid::Error::from)
        .and_then(|data| add_solo_metadata(&data, year));
    match result {
        Ok(XfOutcome::Tagged(bytes)) => {
            let target = output.unwrap_or(input);
            match write_with_backup(target, &bytes, None) {
                Ok(()) => {
                    info!("Added XF solo metadata to {}", target.display());
                    Outcome::Done
                }
                Err(e) => Outcome::Failed(e),
            }
        }
        Ok(XfOutcome::AlreadyTagged) => Outcome::Skipped("already has XF metadata".into()),
        Ok(XfOutcome::NotSingleTrack { tracks }) => {
            Outcome::Skipped(format!("not Format 0 ({} tracks)", tracks))
        }
        Err(e) => Outcome::Failed(e),
    }
}

fn main() -> Result<(), fil2mid::Error> {
    let args = Args::parse();
    args.verbosity.init();
    let year = args.year.unwrap_or_else(current_year);

    let (files, output) = if args.input.is_dir() {
        let files = collect_files(&args.input, &["mid", "midi"], !args.no_recursive)?;
        info!("Found {} MIDI file(s)", files.len());
        (files, None)
    } else {
        (vec![args.input.clone()], args.output.as_deref())
    };

    let mut summary = BatchSummary::new();
    for file in &files {
        summary.record(file, tag(file, output, year));
    }
    if files.len() > 1 {
        summary.report("tagged");
    }

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
