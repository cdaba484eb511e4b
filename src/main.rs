use clap::Parser;
use fil2mid::batch::{collect_files, BatchSummary, Outcome};
use fil2mid::cli::Verbosity;
use fil2mid::fil::input::{fil_stem, midi_output_path, read_fil, EXTENSIONS};
use fil2mid::smf::{xf, Assembler, ChannelMap, DevicePreset, PresetName, UserOverrides};
use fil2mid::title::title_from_filename;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "fil2mid")]
#[command(version = "0.1.0")]
#[command(about = "Yamaha FIL (ESEQ) to Standard MIDI File converter", long_about = None)]
struct Args {
    /// Input .fil or .fil.b64 file, or a directory of them
    #[arg(default_value = ".")]
    input: PathBuf,

    /// Output MIDI file, or output directory when the input is a directory
    /// (default: next to the input with a .mid extension)
    output: Option<PathBuf>,

    /// Descend into subdirectories
    #[arg(short, long)]
    recursive: bool,

    /// MIDI ticks per FIL delta unit, ignored when the header declares a timebase
    #[arg(long, default_value_t = 0.82)]
    ticks_per_unit: f64,

    /// Move every channel-voice event to this channel (0-15)
    #[arg(long)]
    force_channel: Option<u8>,

    /// Channel remapping as src:dst pairs, e.g. "1:0,2:0"
    #[arg(long)]
    channel_map: Option<ChannelMap>,

    /// Tempo in BPM (default: 120, or the preset's tempo)
    #[arg(long)]
    tempo_bpm: Option<f64>,

    /// Device preset (dkc900)
    #[arg(long)]
    preset: Option<PresetName>,

    /// Use the file name, minus any track number, as the title
    #[arg(long)]
    title_from_filename: bool,

    /// Do not write the copyright and XF device markers
    #[arg(long)]
    no_xf: bool,

    /// Copyright year (default: current year)
    #[arg(long)]
    year: Option<u16>,

    #[command(flatten)]
    verbosity: Verbosity,
}

fn main() -> Result<(), fil2mid::Error> {
    let args = Args::parse();
    args.verbosity.init();

    let preset = DevicePreset::resolve(
        args.preset,
        UserOverrides {
            channel_map: args.channel_map.clone(),
            force_channel: args.force_channel,
            tempo_bpm: args.tempo_bpm,
        },
    )?;

    if !args.input.is_dir() {
        let output = args
            .output
            .clone()
            .unwrap_or_else(|| midi_output_path(&args.input));
        return convert(&args, &preset, &args.input, &output);
    }

    let files = collect_files(&args.input, &EXTENSIONS, args.recursive)?;
    if files.is_empty() {
        warn!("No .fil or .fil.b64 files found in {}", args.input.display());
        return Ok(());
    }
    info!("Found {} FIL file(s)", files.len());

    let mut summary = BatchSummary::new();
    for file in &files {
        let output = batch_output(&args.input, args.output.as_deref(), file);
        let outcome = match convert(&args, &preset, file, &output) {
            Ok(()) => Outcome::Done,
            Err(e) => Outcome::Failed(e),
        };
        summary.record(file, outcome);
    }
    summary.report("converted");

    if summary.has_failures() {
        std::process::exit(1);
    }
    Ok(())
}

/// Output path for `file` found under `input_dir`, mirroring subdirectories
/// under `output_dir` when one is given
fn batch_output(input_dir: &Path, output_dir: Option<&Path>, file: &Path) -> PathBuf {
    let target = match output_dir {
        Some(dir) => dir.join(file.strip_prefix(input_dir).unwrap_or(file)),
        None => file.to_path_buf(),
    };
    midi_output_path(&target)
}

fn convert(
    args: &Args,
    preset: &DevicePreset,
    input: &Path,
    output: &Path,
) -> Result<(), fil2mid::Error> {
    let data = read_fil(input)?;
    let stream = fil2mid::decode(&data)?;
    if stream.events.is_empty() {
        warn!("{}: no events decoded", input.display());
    }

    let title = if args.title_from_filename {
        fil_stem(input).and_then(title_from_filename)
    } else {
        None
    };
    let year = (!args.no_xf).then(|| args.year.unwrap_or_else(xf::current_year));

    let assembler = Assembler::new(preset.clone())
        .ticks_per_unit(args.ticks_per_unit)
        .title(title)
        .xf_metadata(year);
    let (track, stats) = assembler.assemble(&stream)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, track.to_bytes()?)?;

    info!(
        "{} -> {} ({} events, {} ticks, {} dropped)",
        input.display(),
        output.display(),
        stats.written,
        track.duration(),
        stream.dropped + stats.dropped
    );
    Ok(())
}
