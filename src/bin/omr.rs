use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use log::LevelFilter;
use std::error::Error;
use std::path::PathBuf;

use omr_sheet_reader::answer_key::AnswerKey;
use omr_sheet_reader::layout::Layout;
use omr_sheet_reader::reader::{DecoderConfig, ReadOptions, SheetReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Read an answer-key sheet
    Answer,
    /// Read a student sheet, grading it when --key is given
    Grade,
}

#[derive(Parser, Debug)]
#[command(
    name = "omr",
    about = "Decode bubble answer sheets into answers and a student number (JSON on stdout)",
    version,
    group(
        ArgGroup::new("input")
            .required(true)
            .args(["image", "dir"])
    )
)]
struct Cli {
    /// What kind of sheet is being read
    #[arg(long, value_enum)]
    mode: Mode,

    /// Sheet image to decode
    #[arg(short = 'i', long)]
    image: Option<PathBuf>,

    /// Decode every image in this directory
    #[arg(short = 'd', long = "dir")]
    dir: Option<PathBuf>,

    /// Layout JSON describing the bubble regions
    #[arg(short = 'l', long)]
    layout: PathBuf,

    /// Decoder configuration JSON (thresholds, region names, binarization)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Answer key JSON to grade against (grade mode)
    #[arg(short = 'k', long)]
    key: Option<PathBuf>,

    /// Save the decoded answers as an answer key (answer mode, single image)
    #[arg(long = "write-key")]
    write_key: Option<PathBuf>,

    /// Skip writing <stem>_debug.jpg next to each image
    #[arg(long = "no-debug-image")]
    no_debug_image: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.key.is_some() && cli.mode != Mode::Grade {
        return Err("--key is only used in grade mode".into());
    }
    if cli.write_key.is_some() && (cli.mode != Mode::Answer || cli.image.is_none()) {
        return Err("--write-key needs answer mode and a single --image".into());
    }

    let layout = Layout::load(&cli.layout)?;
    let config = match &cli.config {
        Some(path) => DecoderConfig::load(path)?,
        None => DecoderConfig::default(),
    };
    let options = ReadOptions {
        debug_image: !cli.no_debug_image,
        answer_key: cli.key.as_deref().map(AnswerKey::load).transpose()?,
    };
    let reader = SheetReader::new(layout, config);

    if let Some(dir) = &cli.dir {
        if !dir.is_dir() {
            return Err(format!("Not a directory: {}", dir.display()).into());
        }
        let entries = reader.read_dir(dir, &options)?;
        if entries.is_empty() {
            eprintln!("No images found in {}", dir.display());
        }
        println!("{}", to_json(&entries, cli.pretty)?);
        return Ok(());
    }

    let Some(image) = &cli.image else {
        return Err("either --image or --dir is required".into());
    };
    let output = reader.read_path(image, &options)?;

    if let Some(path) = &cli.write_key {
        AnswerKey(output.report.answers.clone()).save(path)?;
    }

    println!("{}", to_json(&output, cli.pretty)?);
    Ok(())
}
