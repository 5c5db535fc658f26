//! pdfsig CLI - PDF text, table and signature analysis

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfsig::{
    render, AnalysisResult, AnalyzeOptions, Analyzer, DisabledOcr, JsonFormat, SignatureField,
    TesseractEngine,
};

#[derive(Parser)]
#[command(name = "pdfsig")]
#[command(version)]
#[command(about = "Analyze PDF text, tables, and digital and wet signatures", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a PDF and print the JSON result
    Analyze {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output compact JSON
        #[arg(long)]
        compact: bool,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Print a summary of digital and wet signatures
    #[command(alias = "sig")]
    Signatures {
        /// Input PDF file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[command(flatten)]
        analysis: AnalysisArgs,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct AnalysisArgs {
    /// OCR pages with fewer native characters than this
    #[arg(long, env = "PDFSIG_OCR_THRESHOLD", default_value_t = 1000)]
    ocr_threshold: usize,

    /// Minimum ink density for a wet signature
    #[arg(long, env = "PDFSIG_DENSITY_THRESHOLD", default_value_t = 0.02)]
    density_threshold: f32,

    /// Never run OCR
    #[arg(long)]
    no_ocr: bool,

    /// Path to the tesseract executable
    #[arg(long, env = "PDFSIG_TESSERACT", value_name = "PATH", default_value = "tesseract")]
    tesseract: PathBuf,

    /// OCR language
    #[arg(long, env = "PDFSIG_LANG", default_value = "eng")]
    lang: String,

    /// Per-call OCR timeout in seconds (0 = unbounded)
    #[arg(long, env = "PDFSIG_OCR_TIMEOUT", default_value_t = 60)]
    ocr_timeout: u64,

    /// Process pages one at a time
    #[arg(long)]
    sequential: bool,
}

impl AnalysisArgs {
    fn analyzer(&self) -> Analyzer {
        let timeout = (self.ocr_timeout > 0).then(|| Duration::from_secs(self.ocr_timeout));
        let options = AnalyzeOptions::new()
            .with_ocr_threshold(self.ocr_threshold)
            .with_density_threshold(self.density_threshold)
            .with_ocr_timeout(timeout)
            .with_parallel(!self.sequential);

        let analyzer = Analyzer::new().with_options(options);
        if self.no_ocr {
            return analyzer.with_ocr_engine(DisabledOcr);
        }

        let engine = TesseractEngine::new()
            .with_binary(&self.tesseract)
            .with_language(&self.lang)
            .with_timeout(timeout);
        if !engine.is_available() {
            log::warn!(
                "{} is not runnable, scanned pages will have no text",
                self.tesseract.display()
            );
        }
        analyzer.with_ocr_engine(engine)
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Analyze {
            input,
            output,
            compact,
            analysis,
        } => cmd_analyze(&input, output.as_deref(), compact, &analysis),
        Commands::Signatures { input, analysis } => cmd_signatures(&input, &analysis),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_analysis(
    input: &Path,
    args: &AnalysisArgs,
    show_progress: bool,
) -> Result<AnalysisResult, Box<dyn std::error::Error>> {
    let data = fs::read(input)?;

    let spinner = show_progress.then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Analyzing {}...", input.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = args.analyzer().analyze(&data);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(result?)
}

fn cmd_analyze(
    input: &Path,
    output: Option<&Path>,
    compact: bool,
    args: &AnalysisArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_analysis(input, args, output.is_some())?;

    let format = if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    };
    let json = render::to_json(&result, format)?;

    if let Some(path) = output {
        fs::write(path, &json)?;
        println!("{} {}", "Saved to".green(), path.display());
    } else {
        println!("{}", json);
    }

    for diagnostic in &result.diagnostics {
        let page = diagnostic
            .page
            .map(|p| format!(" (page {})", p))
            .unwrap_or_default();
        eprintln!(
            "{} {:?}{}: {}",
            "warning:".yellow().bold(),
            diagnostic.stage,
            page,
            diagnostic.message
        );
    }

    Ok(())
}

fn cmd_signatures(input: &Path, args: &AnalysisArgs) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_analysis(input, args, true)?;

    println!("{}", "Digital Signatures".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    if result.digital_signatures.is_empty() {
        println!("{}", "none found".dimmed());
    }
    for field in &result.digital_signatures {
        match field {
            SignatureField::Unsigned { field_name } => {
                println!(
                    "{} {}",
                    "○ unsigned".yellow(),
                    field_name.as_deref().unwrap_or("<unnamed>")
                );
            }
            SignatureField::Signed(signed) => {
                println!(
                    "{} {}",
                    "● signed".green().bold(),
                    signed.field_name.as_deref().unwrap_or("<unnamed>")
                );
                if let Some(ref name) = signed.signer_name {
                    println!("    {}: {}", "Signer".bold(), name);
                }
                if let Some(ref reason) = signed.reason {
                    println!("    {}: {}", "Reason".bold(), reason);
                }
                if let Some(ref location) = signed.location {
                    println!("    {}: {}", "Location".bold(), location);
                }
                match (&signed.signed_on, &signed.raw_time) {
                    (Some(time), _) => println!("    {}: {}", "Signed on".bold(), time),
                    (None, Some(raw)) => println!("    {}: {} (unparsed)", "Signed on".bold(), raw),
                    (None, None) => {}
                }
                if let Some(ref filter) = signed.filter {
                    println!("    {}: {}", "Handler".bold(), filter);
                }
            }
            SignatureField::Marker { marker } => {
                println!("{} raw marker {}", "● signed?".green(), marker.dimmed());
            }
        }
    }

    println!();
    println!("{}", "Wet Signatures".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!(
        "{}: {}",
        "Detected".bold(),
        result.wet_signature.wet_signatures_detected
    );
    for candidate in &result.wet_signature.details {
        let region = candidate.region();
        let status = if candidate.is_present() {
            "ink".green().bold()
        } else {
            "empty".dimmed()
        };
        println!(
            "  page {:>3}  {:<22} density {:.3}  {}",
            region.page, region.label, region.ink_density, status
        );
    }

    if result.is_degraded() {
        println!();
        println!(
            "{} {} steps degraded, run `pdfsig analyze` for details",
            "Note:".yellow().bold(),
            result.diagnostics.len()
        );
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "pdfsig".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PDF text, table and signature analysis");
    println!();
    println!("Library: pdfsig {}", pdfsig::version());
    println!("License: MIT");
}
