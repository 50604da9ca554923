//! Command-line interface implementation.
//! Provides argument parsing using clap.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments structure.
#[derive(Parser, Debug)]
#[command(author, version, about = "hipoengine: template renderer", long_about = None)]
pub struct Args {
    /// Template file to render
    #[arg(value_name = "TEMPLATE")]
    pub template: PathBuf,

    /// JSON file providing the render context
    #[arg(short, long, value_name = "FILE")]
    pub context: Option<PathBuf>,

    /// Layout file to embed the template into
    #[arg(short, long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Directory of per-language translation files (en.json, tr.json, ...)
    #[arg(long, value_name = "DIR")]
    pub translations: Option<PathBuf>,

    /// Active language for translation lookups
    #[arg(long, default_value = "en")]
    pub lang: String,

    /// Fallback language tried when a key is missing in the active one
    #[arg(long)]
    pub fallback_lang: Option<String>,

    /// Additional directory to search for templates (repeatable)
    #[arg(long = "template-path", value_name = "DIR")]
    pub template_paths: Vec<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parses command line arguments and returns the Args structure.
pub fn get_args() -> Args {
    Args::parse()
}
