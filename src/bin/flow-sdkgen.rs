//! Flow SDK generator CLI
//!
//! Command-line interface for generating and linting flow definitions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use flow_sdkgen::{generate, lint, FileStatus, GenerateOptions, Language, Severity};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flow-sdkgen")]
#[command(about = "Generate typed Python declarations from flow definitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the SDK package of one integration
    Generate {
        /// Integration name (directory below <source>/flows)
        #[arg(long, short)]
        integration: String,

        /// Unpacked integration package
        #[arg(long, short)]
        source: PathBuf,

        /// Target language
        #[arg(long, default_value = "python")]
        lang: String,

        /// Output directory; the package is written to <out>/<integration>
        #[arg(long, short, default_value = "sdk")]
        out: PathBuf,

        /// Log every classified and merged type
        #[arg(long, short)]
        verbose: bool,
    },

    /// Lint definition files (syntax, process blocks, broken refs, structure)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            integration,
            source,
            lang,
            out,
            verbose,
        } => {
            init_tracing(verbose);
            run_generate(integration, source, &lang, out)
        }

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("flow_sdkgen=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flow_sdkgen=info"))
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn run_generate(integration: String, source: PathBuf, lang: &str, out: PathBuf) -> Result<(), u8> {
    let Some(language) = Language::parse(lang) else {
        eprintln!("Error: unsupported language '{}': expected python", lang);
        return Err(2);
    };

    let options = GenerateOptions::new(integration, source, out).language(language);
    let report = generate(&options).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    println!(
        "Generated {}: {} operations, {} types ({} merged), {} files -> {}",
        report.integration,
        report.operations,
        report.types_registered,
        report.merged.len(),
        report.emit.files_written(),
        report.emit.output.display()
    );
    for anomaly in &report.anomalies {
        println!("  degraded: {}", anomaly);
    }
    for skipped in &report.emit.skipped {
        println!("  skipped: {}", skipped);
    }
    Ok(())
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(2);
    }

    let result = lint(path, strict);

    if format == "json" {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return Err(3);
            }
        }
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if result.is_ok() && (!strict || result.warnings == 0) {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if result.is_ok() && (!strict || result.warnings == 0) {
        Ok(())
    } else {
        Err(1)
    }
}
