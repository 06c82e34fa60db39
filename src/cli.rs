use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show critical errors
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show per-document details
    Verbose,
    /// Show all available debugging information
    Debug,
}

impl VerbosityLevel {
    /// Most detailed `tracing` level printed at this verbosity
    pub fn tracing_level(self) -> tracing::Level {
        match self {
            VerbosityLevel::Quiet => tracing::Level::ERROR,
            VerbosityLevel::Normal => tracing::Level::WARN,
            VerbosityLevel::Verbose => tracing::Level::INFO,
            VerbosityLevel::Debug => tracing::Level::DEBUG,
        }
    }
}

/// Format of the `map` report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
    Summary,
}

/// File format written by `infer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SchemaFormat {
    #[default]
    Toml,
    Json,
}

/// Map XML documents onto declared object schemas
#[derive(Parser, Debug, Clone)]
#[command(name = "xml-ormz")]
#[command(about = "Map XML documents onto typed object models and link references across them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print debug diagnostics
    #[arg(long = "debug", global = true, conflicts_with = "quiet")]
    pub debug: bool,

    /// Configuration file (TOML or JSON)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Map every document under a path and report the results
    Map(MapArgs),
    /// Map one document and print the serialized model
    Dump(DumpArgs),
    /// Infer a schema file from sample documents
    Infer(InferArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MapArgs {
    /// Directory or file to map
    pub path: PathBuf,

    /// Schema file (TOML or JSON)
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,

    /// Resolve reference fields after mapping
    #[arg(long = "link")]
    pub link: bool,

    /// Report format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// File extensions to process (comma-separated)
    #[arg(short = 'e', long = "extensions")]
    pub extensions: Option<String>,

    /// Include file patterns (glob syntax)
    #[arg(long = "include", action = clap::ArgAction::Append)]
    pub include_patterns: Vec<String>,

    /// Exclude file patterns (glob syntax)
    #[arg(long = "exclude", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Directory levels to descend into
    #[arg(long = "max-depth")]
    pub max_depth: Option<usize>,

    /// Number of documents loaded concurrently
    #[arg(short = 't', long = "threads")]
    pub threads: Option<usize>,

    /// Stop at the first document that fails
    #[arg(long = "fail-fast")]
    pub fail_fast: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// Document to map
    pub file: PathBuf,

    /// Schema file (TOML or JSON)
    #[arg(short = 's', long = "schema")]
    pub schema: PathBuf,

    /// Write the XML here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct InferArgs {
    /// Sample documents sharing one root element
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Write the schema here instead of stdout
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Schema file format; taken from the output extension when omitted
    #[arg(long = "schema-format", value_enum)]
    pub schema_format: Option<SchemaFormat>,
}

impl InferArgs {
    pub fn effective_format(&self) -> SchemaFormat {
        self.schema_format.unwrap_or_else(|| {
            match self
                .output
                .as_ref()
                .and_then(|p| p.extension())
                .and_then(|ext| ext.to_str())
            {
                Some("json") => SchemaFormat::Json,
                _ => SchemaFormat::Toml,
            }
        })
    }
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Quiet
        } else if self.debug {
            VerbosityLevel::Debug
        } else if self.verbose {
            VerbosityLevel::Verbose
        } else {
            VerbosityLevel::Normal
        }
    }

    pub fn map_args(&self) -> Option<&MapArgs> {
        match &self.command {
            Command::Map(args) => Some(args),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Map(args) => {
                if !args.path.exists() {
                    return Err(format!("Path does not exist: {}", args.path.display()));
                }
                if let Some(threads) = args.threads
                    && threads == 0
                {
                    return Err("Number of threads must be greater than 0".to_string());
                }
                Ok(())
            }
            Command::Dump(args) => {
                if !args.file.is_file() {
                    return Err(format!("Not a file: {}", args.file.display()));
                }
                Ok(())
            }
            Command::Infer(args) => match args.files.iter().find(|f| !f.is_file()) {
                Some(missing) => Err(format!("Not a file: {}", missing.display())),
                None => Ok(()),
            },
        }
    }
}

impl MapArgs {
    pub fn get_extensions(&self) -> Option<Vec<String>> {
        self.extensions.as_ref().map(|extensions| {
            extensions
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
    }
}
