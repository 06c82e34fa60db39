use crate::cli::VerbosityLevel;
use crate::config::ConfigError;
use crate::error::{MappingError, SchemaError, ValidationError};

/// Prints errors to stderr with detail that follows the verbosity
pub struct ErrorReporter {
    verbosity: VerbosityLevel,
    show_timestamps: bool,
}

impl ErrorReporter {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_timestamps: false,
        }
    }

    pub fn with_timestamps(mut self, show_timestamps: bool) -> Self {
        self.show_timestamps = show_timestamps;
        self
    }

    pub fn report_mapping_error(&self, error: &MappingError) {
        if self.verbosity == VerbosityLevel::Quiet && !self.is_critical_error(error) {
            return;
        }
        eprintln!("{}", self.format_error(error));
    }

    pub fn report_config_error(&self, error: &ConfigError) {
        let formatted = match self.verbosity {
            VerbosityLevel::Quiet => format!("Config error: {}", error),
            VerbosityLevel::Normal | VerbosityLevel::Verbose => {
                format!(
                    "Configuration Error: {}\n{}",
                    error,
                    self.get_config_help(error)
                )
            }
            VerbosityLevel::Debug => {
                format!(
                    "Configuration Error: {}\nDebug: {:?}\n{}",
                    error,
                    error,
                    self.get_config_help(error)
                )
            }
        };
        eprintln!("{}", formatted);
    }

    /// Errors that stop a whole run rather than one document
    fn is_critical_error(&self, error: &MappingError) -> bool {
        matches!(
            error,
            MappingError::Schema(_)
                | MappingError::Configuration(_)
                | MappingError::Discovery(_)
                | MappingError::Concurrency { .. }
        )
    }

    pub fn format_error(&self, error: &MappingError) -> String {
        match self.verbosity {
            VerbosityLevel::Quiet => self.format_error_brief(error),
            VerbosityLevel::Normal => self.format_error_normal(error),
            VerbosityLevel::Verbose => self.format_error_verbose(error),
            VerbosityLevel::Debug => self.format_error_debug(error),
        }
    }

    fn format_error_brief(&self, error: &MappingError) -> String {
        match error {
            MappingError::Schema(_) => format!("SCHEMA: {}", error),
            MappingError::Configuration(_) => format!("LINKER: {}", error),
            _ => format!("ERROR: {}", error),
        }
    }

    fn format_error_normal(&self, error: &MappingError) -> String {
        let timestamp = if self.show_timestamps {
            format!("[{}] ", chrono::Utc::now().format("%H:%M:%S"))
        } else {
            String::new()
        };

        format!("{}{}", timestamp, error)
    }

    fn format_error_verbose(&self, error: &MappingError) -> String {
        let mut output = self.format_error_normal(error);
        if let Some(suggestion) = self.suggestion(error) {
            output.push_str("\nSuggestion: ");
            output.push_str(suggestion);
        }
        output
    }

    fn format_error_debug(&self, error: &MappingError) -> String {
        let mut output = self.format_error_verbose(error);
        output.push_str(&format!("\nDebug Info: {:?}", error));

        output.push_str("\nError Chain:");
        let mut current_error: &dyn std::error::Error = error;
        let mut level = 0;
        while let Some(source) = current_error.source() {
            output.push_str(&format!("\n  {}: {}", level + 1, source));
            current_error = source;
            level += 1;
        }

        output
    }

    fn suggestion(&self, error: &MappingError) -> Option<&'static str> {
        let suggestion = match error {
            MappingError::Schema(SchemaError::File { .. }) => {
                "Check the schema file path and its TOML/JSON syntax"
            }
            MappingError::Schema(_) => "Fix the schema declaration before mapping documents",
            MappingError::Document(_) => "Check that the document is well-formed XML",
            MappingError::Validation(err) => match err.root_cause() {
                ValidationError::UndeclaredElement { .. } => {
                    "Declare the element type in the schema or remove it from the document"
                }
                ValidationError::Cardinality { .. } => {
                    "Adjust the 'count' of the type in the schema or the number of elements"
                }
                ValidationError::TypeMismatch { .. } => {
                    "Change the attribute value or widen the field kind in the schema"
                }
                ValidationError::MissingAttribute { .. } => {
                    "Add the attribute or mark the field optional in the schema"
                }
                _ => return None,
            },
            MappingError::Configuration(_) => {
                "Give every reference field a lookup and make its targets name declared types"
            }
            MappingError::Discovery(_) => "Check the --include/--exclude glob patterns",
            MappingError::Io(_) => "Check that the path exists and is readable",
            MappingError::Structural(_) | MappingError::Concurrency { .. } => return None,
        };
        Some(suggestion)
    }

    fn get_config_help(&self, error: &ConfigError) -> String {
        match error {
            ConfigError::Io(_) => "Check that the configuration file exists and is readable".to_string(),
            ConfigError::TomlParsing(_) | ConfigError::JsonParsing(_) => {
                "Check the configuration file syntax (TOML/JSON format expected)".to_string()
            }
            ConfigError::UnsupportedFormat(ext) => {
                format!("Rename the configuration file from .{} to .toml or .json", ext)
            }
            ConfigError::Environment(_) => format!(
                "Fix or unset the {}* environment variable named above",
                crate::config::ENV_PREFIX
            ),
            ConfigError::Validation(_) => {
                "Resolve conflicting values between file, environment, and CLI".to_string()
            }
        }
    }
}
