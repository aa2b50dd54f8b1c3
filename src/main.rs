//! jpegify CLI - convert a directory tree of images to JPEG

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use console::style;

use jpegify::{init, BatchConverter, ConversionSummary, ConvertConfig};

/// jpegify - batch image to JPEG converter
#[derive(Parser)]
#[command(
    name = "jpegify",
    version,
    about = "Convert images to JPG format and optionally resize them",
    long_about = "Recursively converts every JPEG, PNG, HEIC, DNG, BMP, TIFF and GIF file under \
                  the input directory to a quality-100 JPEG in '<input-dir>/_converted', \
                  optionally shrinking both dimensions by a percentage."
)]
struct Cli {
    /// Path to the input directory containing images
    #[arg(long, value_name = "PATH")]
    input_dir: PathBuf,

    /// Percentage to reduce image size (0-100)
    #[arg(long, value_name = "INTEGER", allow_negative_numbers = true)]
    quality: Option<i64>,

    /// Number of worker threads (default: number of CPUs)
    #[arg(short, long, value_name = "COUNT")]
    threads: Option<usize>,

    /// Print the final summary as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    init(log_level);

    if let Err(e) = run(&cli) {
        eprintln!("{}: {:#}", style("Error").red().bold(), e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = ConvertConfig::new(&cli.input_dir)
        .quality_decrease(cli.quality)
        .show_progress(!cli.json && !cli.quiet);
    if let Some(threads) = cli.threads {
        config = config.workers(threads);
    }

    let summary = BatchConverter::new(config)
        .run()
        .with_context(|| format!("Conversion of '{}' failed", cli.input_dir.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !cli.quiet {
        print_summary(&summary);
    }

    Ok(())
}

/// Print processing summary
fn print_summary(summary: &ConversionSummary) {
    let Some(output_dir) = &summary.output_dir else {
        return;
    };

    println!();
    println!("{}", style("Conversion Summary:").bold());
    println!("  {}: {}/{}", style("Converted").green(), summary.converted, summary.total);
    if summary.failed > 0 {
        println!("  {}: {}", style("Failed").red(), summary.failed);
    }
    println!("  {}: {:.2}s", style("Duration").blue(), summary.elapsed_secs);
    println!("  {}: {:.1} files/sec", style("Speed").cyan(), summary.files_per_second());
    println!("  {}: {}", style("Output").cyan(), output_dir.display());
}
