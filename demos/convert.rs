//! Command-line converter between RTF and flow-document markup.
//!
//! The direction follows the input extension: `.rtf` files become `.xaml`,
//! anything else is read as markup and becomes `.rtf`. Pictures live next to
//! the markup file, in the directory given by `--images` (default: the
//! output file's directory).
//!
//! # Usage
//!
//! ```sh
//! cargo run --example convert -- letter.rtf -o letter.xaml
//! cargo run --example convert -- letter.xaml -o letter.rtf --strict
//! ```

use clap::{Parser, ValueEnum};
use flowrtf::document::Stretch;
use flowrtf::{ConvertOptions, DirectoryImagePackage, rtf_to_xaml, xaml_to_rtf};
use std::fs;
use std::path::{Path, PathBuf};

/// Convert between RTF and flow-document markup
#[derive(Parser, Debug)]
#[command(name = "convert", version)]
struct Args {
    /// Input file (`.rtf` or markup)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output file; defaults to the input with the other extension
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    /// Directory holding image payloads
    #[arg(long, value_name = "DIR")]
    images: Option<PathBuf>,

    /// Fail on malformed input instead of dropping it
    #[arg(long)]
    strict: bool,

    /// Wrap trailing inline content in a paragraph
    #[arg(long)]
    force_paragraph: bool,

    /// Code page assumed before `\ansicpg`
    #[arg(long, default_value_t = 1252)]
    code_page: u32,

    /// Stretch mode for images without one
    #[arg(long, value_enum, default_value = "uniform")]
    stretch: StretchArg,

    /// Force overwrite existing files
    #[arg(short, long)]
    force: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StretchArg {
    None,
    Fill,
    Uniform,
    UniformToFill,
}

impl From<StretchArg> for Stretch {
    fn from(arg: StretchArg) -> Self {
        match arg {
            StretchArg::None => Stretch::None,
            StretchArg::Fill => Stretch::Fill,
            StretchArg::Uniform => Stretch::Uniform,
            StretchArg::UniformToFill => Stretch::UniformToFill,
        }
    }
}

fn is_rtf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("rtf"))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let _ = {
        use log::LevelFilter::*;
        env_logger::builder()
            .filter_module("flowrtf", if args.verbose { Debug } else { Warn })
            .try_init()
    };

    if !args.input.is_file() {
        eprintln!("Error: Input file does not exist: {}", args.input.display());
        std::process::exit(1);
    }

    let from_rtf = is_rtf(&args.input);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| args.input.with_extension(if from_rtf { "xaml" } else { "rtf" }));
    if output.exists() && !args.force {
        eprintln!("Error: Output file already exists: {}", output.display());
        eprintln!("       Use --force to overwrite");
        std::process::exit(1);
    }

    let images = args.images.clone().unwrap_or_else(|| {
        output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    });

    let options = ConvertOptions::new()
        .with_strict(args.strict)
        .with_force_paragraph(args.force_paragraph)
        .with_default_code_page(args.code_page)
        .with_image_stretch(args.stretch.into());

    if from_rtf {
        let input = fs::read(&args.input)?;
        let mut package = DirectoryImagePackage::new(&images);
        let xaml = rtf_to_xaml(&input, &mut package, &options)?;
        fs::write(&output, xaml)?;
    } else {
        let input = fs::read_to_string(&args.input)?;
        let package = DirectoryImagePackage::new(&images);
        let rtf = xaml_to_rtf(&input, &package, &options)?;
        fs::write(&output, rtf)?;
    }

    if args.verbose {
        println!("✓ {} -> {}", args.input.display(), output.display());
    }
    Ok(())
}
