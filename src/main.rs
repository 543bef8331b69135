//! imgresample CLI - batch image resampler
//!
//! Mirrors an input tree of images (or a zip archive) into an output tree,
//! capping the long edge of each image and re-encoding it.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use serde::Serialize;
use tracing::{debug, info};

use imgresample::archive::{InputRoot, OutputRoot};
use imgresample::config::{normalize_path, DEFAULT_PRESET_FILE};
use imgresample::discovery::{filter_images, list_files};
use imgresample::{
    init_logging, process_batch, BatchConfig, BatchReport, Concurrency, ImageResampler,
    OutputFormat, Preset,
};

/// imgresample - batch image resampler
#[derive(Parser)]
#[command(
    name = "imgresample",
    version,
    about = "Downscale a tree of images to a maximum long edge",
    long_about = "Walks the input directory (or zip archive), caps the long edge of every image \
                  and writes it in a single output format into a mirrored output tree \
                  (or zip archive). Settings come from flags, then preset.json, then defaults."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input directory or .zip archive
    #[arg(short, long, value_name = "PATH")]
    input: Option<String>,

    /// Output directory or .zip archive to create
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Maximum length of the long edge in pixels
    #[arg(short, long, value_name = "PIXELS", value_parser = clap::value_parser!(u32).range(1..))]
    size_limit: Option<u32>,

    /// Output format
    #[arg(short, long, value_enum, value_name = "FORMAT")]
    format: Option<CliOutputFormat>,

    /// Encoder quality for jpg and webp (1-100)
    #[arg(short, long, value_name = "QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Keep the alpha channel where the output format allows it
    #[arg(long, conflicts_with = "no_alpha")]
    keep_alpha: bool,

    /// Flatten every image to RGB
    #[arg(long)]
    no_alpha: bool,

    /// Number of parallel workers: a number, "all" or "half"
    #[arg(short, long, value_name = "N", value_parser = parse_concurrency)]
    concurrency: Option<Concurrency>,

    /// Preset file (json, toml or yaml) [default: ./preset.json if present]
    #[arg(short, long, value_name = "FILE")]
    preset: Option<PathBuf>,

    /// Ignore preset files
    #[arg(long, conflicts_with = "preset")]
    no_preset: bool,

    /// Write into an output directory that is not empty
    #[arg(long)]
    overwrite: bool,

    /// Start without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Print the summary as JSON instead of progress bars
    #[arg(long)]
    json: bool,

    /// Exit with status 2 if any image failed
    #[arg(long)]
    strict: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (errors only)
    #[arg(short = 'Q', long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Write a preset file holding the built-in defaults
    ExamplePreset {
        /// Output file path; the extension selects json, toml or yaml
        #[arg(short, long, default_value = DEFAULT_PRESET_FILE)]
        output: PathBuf,
    },
}

/// CLI-compatible output format enum
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliOutputFormat {
    #[value(alias = "jpeg")]
    Jpg,
    Webp,
    Png,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(format: CliOutputFormat) -> Self {
        match format {
            CliOutputFormat::Jpg => OutputFormat::Jpeg,
            CliOutputFormat::Webp => OutputFormat::Webp,
            CliOutputFormat::Png => OutputFormat::Png,
        }
    }
}

fn parse_concurrency(s: &str) -> Result<Concurrency, String> {
    s.parse::<Concurrency>().map_err(|e| e.to_string())
}

impl Cli {
    /// Settings given on the command line
    fn overrides(&self) -> Preset {
        let keep_alpha = if self.keep_alpha {
            Some(true)
        } else if self.no_alpha {
            Some(false)
        } else {
            None
        };

        Preset {
            size_limit: self.size_limit,
            format: self.format.map(Into::into),
            quality: self.quality,
            keep_alpha,
            concurrency: self.concurrency,
        }
    }

    fn show_progress(&self) -> bool {
        !self.json && !self.quiet
    }
}

/// Summary printed with --json
#[derive(Serialize)]
struct JsonSummary<'a> {
    input: &'a str,
    output: PathBuf,
    files_found: usize,
    images: usize,
    settings: &'a BatchConfig,
    #[serde(flatten)]
    report: &'a BatchReport,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    init_logging(log_level);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", style("Error").red().bold(), e);
            1
        }
    };
    process::exit(code);
}

fn run(cli: &Cli) -> anyhow::Result<i32> {
    if let Some(Commands::ExamplePreset { output }) = &cli.command {
        generate_example_preset(output)?;
        return Ok(0);
    }

    let term = Term::stderr();
    let interactive = !cli.yes && std::io::stdin().is_terminal();

    let input_arg = required_path(&term, cli.input.as_deref(), "Input directory or .zip:")?;
    let output_arg = required_path(&term, cli.output.as_deref(), "Output directory or .zip:")?;
    let input_path = normalize_path(&input_arg)?;
    let output_path = normalize_path(&output_arg)?;

    let preset = if cli.no_preset {
        None
    } else {
        Preset::discover(cli.preset.as_deref())?
    };
    let preset = match preset {
        Some((path, preset)) => {
            info!("Loaded preset from {:?}", path);
            if !cli.json {
                println!("{}", style(format!("[*] Detected preset {}:", path.display())).green());
                for line in preset.describe() {
                    println!("{}", style(format!("  - {}", line)).green());
                }
            }
            if !interactive || confirm(&term, "Use this preset?")? {
                Some(preset)
            } else {
                None
            }
        }
        None => None,
    };

    let mut settings = preset.unwrap_or_default().merge(cli.overrides());
    if interactive {
        settings = settings.fill_missing(|prompt, default| ask(&term, prompt, default))?;
    }
    for line in settings.describe() {
        debug!("  setting {}", line);
    }

    let input_root = InputRoot::resolve(&input_path)?;
    let output_root = OutputRoot::resolve(&output_path)?;

    let config = settings.into_config(
        input_root.path().to_path_buf(),
        output_root.path().to_path_buf(),
    );
    config.validate()?;

    if !output_root.is_archive() && !cli.overwrite && has_entries(&config.output_root)? {
        bail!(
            "Output directory is not empty: {} (pass --overwrite to write into it anyway)",
            output_path.display()
        );
    }

    info!("Input: {:?}", input_path);
    info!("Output: {:?}", output_path);

    let files = list_files(&config.input_root)
        .with_context(|| format!("Failed to read input {}", input_path.display()))?;
    let files_found = files.len();
    let images = filter_images(files);

    if !cli.json {
        println!("{} files found", style(files_found).bold());
        println!("{} images", style(images.len()).bold());
        print_settings(&config);
    }

    if !cli.yes && !confirm(&term, "Proceed?")? {
        println!("Aborted");
        return Ok(1);
    }

    let report = process_batch(
        &config,
        &images,
        Arc::new(ImageResampler::new()),
        cli.show_progress(),
    )?;
    let destination = output_root.finish()?;

    if cli.json {
        let summary = JsonSummary {
            input: &input_arg,
            output: destination,
            files_found,
            images: images.len(),
            settings: &config,
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!();
        report.print_summary();
        println!("  Output: {}", destination.display());
    }

    Ok(if cli.strict && !report.is_clean() { 2 } else { 0 })
}

/// Take the path from the flag, or ask for it on an interactive terminal
fn required_path(term: &Term, given: Option<&str>, prompt: &str) -> anyhow::Result<String> {
    if let Some(path) = given {
        return Ok(path.to_string());
    }

    if !std::io::stdin().is_terminal() {
        bail!("{} is required (see --help)", prompt.trim_end_matches(':'));
    }

    term.write_str(&format!("{} ", style(prompt).bold()))?;
    Ok(term.read_line()?)
}

/// Ask one setting, showing its default
fn ask(term: &Term, prompt: &str, default: &str) -> imgresample::Result<String> {
    term.write_str(&format!("{} [{}]: ", style(prompt).bold(), default))?;
    Ok(term.read_line()?)
}

/// Yes/no question; an empty answer means yes
fn confirm(term: &Term, question: &str) -> anyhow::Result<bool> {
    if !std::io::stdin().is_terminal() {
        bail!("Not running on a terminal; pass --yes to start without confirmation");
    }

    term.write_str(&format!("{} [Y/n] ", question))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes"))
}

fn has_entries(dir: &Path) -> anyhow::Result<bool> {
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?;
    Ok(entries.next().is_some())
}

fn print_settings(config: &BatchConfig) {
    println!("{}", style("Settings:").bold());
    println!("  Size limit: {}px", config.size_limit);
    println!("  Format: {}", config.output_format);
    match config.quality {
        Some(quality) => println!("  Quality: {}", quality),
        None => println!("  Quality: lossless"),
    }
    println!("  Keep alpha: {}", config.keep_alpha);
    println!("  Workers: {}", config.concurrency);
}

/// Generate example preset file
fn generate_example_preset(output_path: &Path) -> anyhow::Result<()> {
    if output_path.exists() {
        bail!("{} already exists", output_path.display());
    }

    Preset::defaults().to_file(output_path)?;
    println!("{}: Generated example preset: {}",
             style("Success").green().bold(),
             output_path.display());
    Ok(())
}
