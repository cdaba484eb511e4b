//! FIL to JSON dumper

use clap::Parser;
use fil2mid::fil::{decode, read_fil, FilJson};
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fil2json")]
#[command(version = "0.1.0")]
#[command(about = "Dump a decoded Yamaha FIL file as JSON", long_about = None)]
struct Args {
    /// Input FIL file (.fil, or base64-wrapped .fil.b64)
    input: PathBuf,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,

    #[command(flatten)]
    verbosity: fil2mid::cli::Verbosity,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    args.verbosity.init();

    let data = read_fil(&args.input)?;
    let stream = decode(&data)?;
    let fil_json = FilJson::new(stream);

    let json_string = if args.compact {
        serde_json::to_string(&fil_json)?
    } else {
        serde_json::to_string_pretty(&fil_json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}
