//! undoc CLI - document to Markdown normalization tool

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use undoc::render::{to_markdown, RenderOptions};
use undoc::{ConvertOptions, ConvertOutcome, Converter, OcrConfig, OutputFormat, SourceFormat};

#[derive(Parser)]
#[command(name = "undoc")]
#[command(author = "iyulab")]
#[command(version)]
#[command(
    about = "Normalize PDF, Word, Excel, HTML, text and images into Markdown",
    long_about = None
)]
struct Cli {
    /// Input file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Output file (next to the input if not specified)
    #[arg(short, long, value_name = "OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    options: CommonOptions,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone)]
struct CommonOptions {
    /// Directory for extracted images, drawings and equations
    #[arg(long, value_name = "DIR", global = true)]
    media_dir: Option<PathBuf>,

    /// Do not write sheet names as headings
    #[arg(long, global = true)]
    no_sheet_names: bool,

    /// OCR language packs
    #[arg(
        long,
        value_name = "LANG",
        default_value = undoc::ocr::DEFAULT_LANGUAGE,
        global = true
    )]
    ocr_lang: String,

    /// OCR language data directory
    #[arg(long, value_name = "DIR", env = "TESSDATA_PREFIX", global = true)]
    tessdata: Option<PathBuf>,

    /// Write the node sequence as JSON instead of Markdown
    #[arg(long, global = true)]
    json: bool,

    /// Disable PDF table detection
    #[arg(long, global = true)]
    no_tables: bool,
}

impl CommonOptions {
    fn convert_options(&self) -> ConvertOptions {
        let mut ocr = OcrConfig::new().with_language(self.ocr_lang.as_str());
        if let Some(ref dir) = self.tessdata {
            ocr = ocr.with_data_path(dir);
        }

        let format = if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Markdown
        };

        ConvertOptions::new()
            .with_sheet_names(!self.no_sheet_names)
            .with_pdf_tables(!self.no_tables)
            .with_format(format)
            .with_ocr(ocr)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one document
    Convert {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (next to the input if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Convert many documents in parallel, each next to its input
    Batch {
        /// Input files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Extract the text of several images into one Markdown report
    Ocr {
        /// Input images
        #[arg(value_name = "IMAGES", required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List supported input formats
    Formats,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Some(Commands::Convert { input, output }) => {
            cmd_convert(&input, output.as_deref(), &cli.options)
        }
        Some(Commands::Batch { inputs }) => cmd_batch(&inputs, &cli.options),
        Some(Commands::Ocr { inputs, output }) => {
            cmd_ocr(&inputs, output.as_deref(), &cli.options)
        }
        Some(Commands::Formats) => {
            cmd_formats();
            Ok(())
        }
        None => {
            // Default behavior: convert if input is provided
            if let Some(input) = cli.input {
                cmd_convert(&input, cli.output.as_deref(), &cli.options)
            } else {
                println!("{}", "Usage: undoc <FILE> [-o OUTPUT]".yellow());
                println!("       undoc --help for more information");
                Ok(())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn cmd_convert(
    input: &Path,
    output: Option<&Path>,
    options: &CommonOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut convert_options = options.convert_options();
    let output = match output {
        Some(path) => path.to_path_buf(),
        None => Converter::new(convert_options.clone()).output_path(input),
    };

    // Media links are relative to the output file unless a directory is given
    let media_root = match options.media_dir {
        Some(ref dir) => dir.clone(),
        None => output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    convert_options = convert_options.with_media_root(media_root);

    let converter = Converter::new(convert_options);
    match converter.convert(input, &output)? {
        ConvertOutcome::Converted(report) => {
            println!(
                "{} {} ({})",
                "Saved to".green(),
                report.output.display(),
                report.format
            );
            if !report.media_files.is_empty() {
                println!(
                    "  {} {} media files",
                    "└─".dimmed(),
                    report.media_files.len()
                );
            }
            for warning in &report.warnings {
                println!("  {} {}", "Warning:".yellow(), warning);
            }
        }
        ConvertOutcome::Skipped { input } => {
            println!(
                "{} {} (unsupported extension)",
                "Skipped".yellow(),
                input.display()
            );
        }
    }

    Ok(())
}

fn cmd_batch(
    inputs: &[PathBuf],
    options: &CommonOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let converter = Converter::new(options.convert_options());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} [{elapsed}]")
            .unwrap(),
    );
    pb.set_message(format!("Converting {} files...", inputs.len()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let results = converter.convert_batch(inputs);
    pb.finish_with_message("Done!");

    let mut failed = 0;
    for (input, result) in &results {
        match result {
            Ok(ConvertOutcome::Converted(report)) => {
                println!(
                    "  {} {} -> {}",
                    "✓".green(),
                    input.display(),
                    report.output.display()
                );
                for warning in &report.warnings {
                    println!("      {} {}", "Warning:".yellow(), warning);
                }
            }
            Ok(ConvertOutcome::Skipped { .. }) => {
                println!("  {} {} (unsupported)", "-".dimmed(), input.display());
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "✗".red(), input.display(), e);
            }
        }
    }

    println!(
        "\n{} {} converted, {} failed",
        "Summary:".bold(),
        results.len() - failed,
        failed
    );

    if failed > 0 {
        return Err(format!("{} of {} files failed", failed, results.len()).into());
    }
    Ok(())
}

fn cmd_ocr(
    inputs: &[PathBuf],
    output: Option<&Path>,
    options: &CommonOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let converter = Converter::new(options.convert_options());
    let nodes = converter.image_extractor().extract_many(inputs)?;
    let markdown = to_markdown(&nodes, &RenderOptions::new());

    if let Some(path) = output {
        std::fs::write(path, &markdown)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", markdown);
    }

    Ok(())
}

fn cmd_formats() {
    println!("{}", "Supported formats".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for format in SourceFormat::ALL {
        println!(
            "{:<14} {}",
            format.name().bold(),
            format.extensions().join(", ")
        );
    }
}
