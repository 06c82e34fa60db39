//! Report formatting for the `map` command

use std::time::Duration;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::engine::{DocumentResult, DocumentStatus, LinkSummary, MappingResults};

/// Formats [`MappingResults`] for the terminal or as JSON
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_results(&self, results: &MappingResults) -> Result<String, serde_json::Error> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(results),
            OutputFormat::Summary => Ok(self.format_one_line(results)),
            OutputFormat::Human => Ok(self.format_human(results)),
        }
    }

    fn format_human(&self, results: &MappingResults) -> String {
        let mut output = String::new();

        if self.verbosity == VerbosityLevel::Quiet {
            if results.has_errors() {
                output.push_str(&format!(
                    "Errors: {} Invalid: {}\n",
                    results.error_files, results.invalid_files
                ));
            }
            return output;
        }

        for file_result in &results.file_results {
            if !file_result.status.is_mapped() || self.verbosity >= VerbosityLevel::Verbose {
                output.push_str(&self.format_file_result(file_result));
                output.push('\n');
            }
        }

        output.push_str(&self.format_summary(results));
        if let Some(link) = &results.link {
            output.push_str(&self.format_link(link));
        }
        output
    }

    fn format_one_line(&self, results: &MappingResults) -> String {
        let mut line = format!(
            "{} files: {} mapped, {} invalid, {} errors, {} instances, {} warnings",
            results.total_files,
            results.mapped_files,
            results.invalid_files,
            results.error_files,
            results.total_instances,
            results.total_warnings
        );
        if let Some(link) = &results.link {
            line.push_str(if link.succeeded() {
                ", linked"
            } else {
                ", link failed"
            });
        }
        line.push('\n');
        line
    }

    pub fn format_file_result(&self, result: &DocumentResult) -> String {
        let path_display = result.path.display();
        let duration_str = format_duration(result.duration);

        let mut output = match &result.status {
            DocumentStatus::Mapped { instances } => format!(
                "{}  {} ({}) - {} instance{}",
                self.colorize("✓ MAPPED", "32"),
                path_display,
                duration_str,
                instances,
                if *instances == 1 { "" } else { "s" }
            ),
            DocumentStatus::Invalid { message } => format!(
                "{}  {} ({})\n    {}",
                self.colorize("✗ INVALID", "31"),
                path_display,
                duration_str,
                message
            ),
            DocumentStatus::Error { message } => format!(
                "{}  {} ({})\n    {}",
                self.colorize("⚠ ERROR", "33"),
                path_display,
                duration_str,
                message
            ),
        };

        if result.warnings > 0 {
            output.push_str(&format!(
                " [{} warning{}]",
                result.warnings,
                if result.warnings == 1 { "" } else { "s" }
            ));
        }
        output
    }

    fn format_summary(&self, results: &MappingResults) -> String {
        let mut output = String::new();
        output.push_str("Mapping Summary:\n");
        output.push_str(&format!("  Total files: {}\n", results.total_files));
        output.push_str(&format!(
            "  {} {}\n",
            self.colorize("Mapped:", "32"),
            results.mapped_files
        ));

        if results.invalid_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Invalid:", "31"),
                results.invalid_files
            ));
        }
        if results.error_files > 0 {
            output.push_str(&format!(
                "  {} {}\n",
                self.colorize("Errors:", "33"),
                results.error_files
            ));
        }

        output.push_str(&format!("  Instances: {}\n", results.total_instances));
        if results.total_warnings > 0 {
            output.push_str(&format!("  Warnings: {}\n", results.total_warnings));
        }
        output.push_str(&format!("  Success rate: {:.1}%\n", results.success_rate()));
        output.push_str(&format!(
            "  Duration: {}\n",
            format_duration(results.total_duration)
        ));

        if self.verbosity == VerbosityLevel::Debug {
            output.push_str(&format!(
                "  Average per file: {}\n",
                format_duration(results.average_duration)
            ));
        }

        output
    }

    fn format_link(&self, link: &LinkSummary) -> String {
        let mut output = String::from("Linking:\n");
        if let Some(report) = &link.report {
            output.push_str(&format!("  Instances: {}\n", report.instances));
            output.push_str(&format!("  Assigned: {}\n", report.assigned));
            if report.unresolved > 0 {
                output.push_str(&format!("  Unresolved: {}\n", report.unresolved));
            }
            if report.empty > 0 {
                output.push_str(&format!("  Empty: {}\n", report.empty));
            }
        }
        if let Some(error) = &link.error {
            output.push_str(&format!("  {} {}\n", self.colorize("Failed:", "31"), error));
        }
        output
    }
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{:.0}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        let secs = total_secs % 60.0;
        format!("{}m{:.1}s", mins, secs)
    }
}
