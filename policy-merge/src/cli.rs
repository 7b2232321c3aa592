use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "policy-merge")]
#[command(about = "Merge, diff and validate process and network security policies")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Merge one or more documents into a base document.
    Merge(MergeArgs),
    /// Merge documents into a base and show the changes to the base.
    Diff(DiffArgs),
    /// Validate one document against a validation profile.
    Validate(ValidateArgs),
}

#[derive(Parser, Debug)]
pub struct MergeArgs {
    pub base: PathBuf,
    #[arg(required = true)]
    pub others: Vec<PathBuf>,
    /// Widen both sides instead of only extending the base.
    #[arg(long)]
    pub symmetric: bool,
    #[arg(long)]
    pub output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = DocumentFormat::Yaml)]
    pub format: DocumentFormat,
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    pub base: PathBuf,
    #[arg(required = true)]
    pub others: Vec<PathBuf>,
    #[arg(long)]
    pub symmetric: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    pub file: PathBuf,
    #[arg(long)]
    pub profiles_dir: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Fail on warnings as well as errors.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
