//! Repair corrupted key-signature mode bytes in MIDI files

use clap::Parser;
use fil2mid::batch::{collect_files, BatchSummary, Outcome};
use fil2mid::cli::Verbosity;
use fil2mid::smf::{repair_file, scan_key_signatures, RepairReport};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "repair_key_signature")]
#[command(version = "0.1.0")]
#[command(about = "Fix key signatures whose mode is neither major nor minor", long_about = None)]
struct Args {
    /// MIDI file or directory
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output file (single file only; default: overwrite the input and keep
    /// <stem>.original.<ext>)
    output: Option<PathBuf>,

    /// Only report invalid key signatures, write nothing
    #[arg(long)]
    check: bool,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn check(path: &Path) -> fil2mid::Result<RepairReport> {
    let data = fs::read(path)?;
    let report = scan_key_signatures(&data)?;
    for fault in &report.faults {
        warn!(
            "{}: track {} key signature at 0x{:X} has mode 0x{:02X}",
            path.display(),
            fault.track,
            fault.offset,
            fault.mode
        );
    }
    Ok(report)
}

fn process(args: &Args, input: &Path, output: Option<&Path>) -> Outcome {
    let result = if args.check {
        check(input)
    } else {
        repair_file(input, output)
    };
    match result {
        Ok(report) if report.repairs() > 0 => Outcome::Done,
        Ok(_) => Outcome::Skipped("no invalid key signatures".into()),
        Err(e) => Outcome::Failed(e),
    }
}

fn is_backup(path: &Path) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.ends_with(".original"))
        .unwrap_or(false)
}

fn main() -> Result<(), fil2mid::Error> {
    let args = Args::parse();
    args.verbosity.init();

    if !args.input.is_dir() {
        let outcome = process(&args, &args.input, args.output.as_deref());
        let failed = matches!(outcome, Outcome::Failed(_));
        BatchSummary::new().record(&args.input, outcome);
        if failed {
            std::process::exit(1);
        }
        return Ok(());
    }

    let files: Vec<_> = collect_files(&args.input, &["mid", "midi"], args.recursive)?
        .into_iter()
        .filter(|p| !is_backup(p))
        .collect();
    info!("Scanning {} MIDI file(s)", files.len());

    let mut summary = BatchSummary::new();
    for file in &files {
        let outcome = process(&args, file, None);
        summary.record(file, outcome);
    }
    summary.report(if args.check { "need repair" } else { "repaired" });

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}
