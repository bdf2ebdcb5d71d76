//! IPI-Shield CLI - Command-line interface for content inspection

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shield_core::{
    AnalysisRequest, ContentType, SanitizationMode, Shield, ShieldConfig,
};

#[derive(Parser)]
#[command(name = "ipi-shield")]
#[command(about = "IPI-Shield - Indirect Prompt Injection Detection and Sanitization")]
struct Cli {
    /// Configuration file path (JSON). Defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Analyze content and print the verdict
    Analyze {
        /// Content to analyze; reads stdin when omitted
        text: Option<String>,
        /// Read content from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Content origin channel
        #[arg(long, default_value = "text")]
        content_type: String,
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sanitize content and print the rewritten text
    Sanitize {
        /// Content to sanitize; reads stdin when omitted
        text: Option<String>,
        /// Read content from a file instead
        #[arg(short, long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Sanitization mode: strict, balanced, or permissive
        #[arg(short, long, default_value = "balanced")]
        mode: String,
        /// Emit the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List registered signals and their availability
    Signals,
    /// Check configuration validity
    Check,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ShieldConfig> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing config {}", path.display()))
        }
        None => Ok(ShieldConfig::default()),
    }
}

fn read_content(text: Option<String>, file: Option<&PathBuf>) -> anyhow::Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        (None, None) => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            Ok(buf)
        }
    }
}

fn parse_content_type(s: &str) -> anyhow::Result<ContentType> {
    match s {
        "text" => Ok(ContentType::Text),
        "html" => Ok(ContentType::Html),
        "image-derived" => Ok(ContentType::ImageDerived),
        other => anyhow::bail!("unknown content type '{other}'"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Commands::Analyze {
            text,
            file,
            content_type,
            json,
        } => {
            let shield = Shield::new(load_config(cli.config.as_ref())?)?;
            let content = read_content(text, file.as_ref())?;
            let content_type = parse_content_type(&content_type)?;
            let request = AnalysisRequest::new(content, content_type);
            let report = shield.analyze(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "injection: {:.2}  safety: {:.2}  risk: {}  action: {:?}",
                    report.score.injection_score,
                    report.score.safety_score,
                    report.score.risk_category,
                    report.score.recommended_action,
                );
                for (kind, seg) in report.flagged_segments() {
                    println!(
                        "  [{kind}] {}..{} {} ({:.2}): {}",
                        seg.start, seg.end, seg.pattern_type, seg.confidence, seg.reason
                    );
                }
            }
        }
        Commands::Sanitize {
            text,
            file,
            mode,
            json,
        } => {
            let shield = Shield::new(load_config(cli.config.as_ref())?)?;
            let content = read_content(text, file.as_ref())?;
            let mode: SanitizationMode = mode.parse()?;
            let result = shield.sanitize(&content, ContentType::Text, mode).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", result.sanitized_content);
                eprintln!(
                    "mode: {}  modified: {}  risk: {:.2} -> {:.2}",
                    result.mode,
                    result.segments_modified,
                    result.original_risk_score,
                    result.post_sanitization_risk_score,
                );
                for warning in &result.warnings {
                    eprintln!("warning: {warning}");
                }
            }
        }
        Commands::Signals => {
            let shield = Shield::new(load_config(cli.config.as_ref())?)?;
            for kind in shield.available_signals() {
                println!("{kind}: available");
            }
        }
        Commands::Check => match load_config(cli.config.as_ref())?.validate() {
            Ok(()) => println!("configuration OK"),
            Err(e) => {
                eprintln!("configuration invalid: {e}");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}
