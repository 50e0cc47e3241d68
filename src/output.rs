//! Rendering of validation results and batch conversion summaries.

use std::io::Cursor;
use std::time::Duration;

use clap::ValueEnum;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};

use crate::cli::VerbosityLevel;
use crate::converter::BatchSummary;
use crate::error::Result;
use crate::validator::{FileValidationResult, ValidationResults};

/// Format of validation output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Xml,
}

/// Formatter for command output
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

    /// Results to print; quiet mode keeps only failing files
    fn shown<'a>(&self, results: &'a ValidationResults) -> Vec<&'a FileValidationResult> {
        results
            .file_results
            .iter()
            .filter(|r| self.verbosity != VerbosityLevel::Quiet || !r.is_valid())
            .collect()
    }

    pub fn format_results(&self, results: &ValidationResults) -> Result<String> {
        let shown = self.shown(results);
        match self.format {
            OutputFormat::Text => Ok(self.format_text(results, &shown)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&shown)?),
            OutputFormat::Xml => format_xml(&shown),
        }
    }

    fn format_text(&self, results: &ValidationResults, shown: &[&FileValidationResult]) -> String {
        let mut output = String::new();
        for result in shown {
            output.push_str(&self.format_file_result(result));
            output.push('\n');
        }

        if results.total_files > 1 && self.verbosity != VerbosityLevel::Quiet {
            output.push_str(&format!(
                "Validated {} files: {} valid, {} invalid",
                results.total_files,
                self.colorize(&results.valid_files.to_string(), "32"),
                self.colorize(&results.invalid_files.to_string(), "31"),
            ));
            if self.verbosity == VerbosityLevel::Verbose {
                output.push_str(&format!(" in {}", format_duration(results.total_duration)));
            }
            output.push('\n');
        }
        output
    }

    pub fn format_file_result(&self, result: &FileValidationResult) -> String {
        let mut output = format!("File: {}\n", result.path.display());

        if result.is_valid() {
            output.push_str(&format!("Status: {}\n", self.colorize("VALID ✓", "32")));
        } else {
            output.push_str(&format!("Status: {}\n", self.colorize("INVALID ✗", "31")));
        }

        if !result.report.errors.is_empty() {
            output.push_str(if result.is_valid() {
                "Warnings:\n"
            } else {
                "Errors:\n"
            });
            for error in &result.report.errors {
                output.push_str(&format!("  - {}\n", error));
            }
        }
        output
    }

    pub fn format_batch_summary(&self, summary: &BatchSummary) -> String {
        let mut output = format!(
            "converted {}, failed {}\n",
            summary.converted.len(),
            summary.failed.len()
        );

        if self.verbosity == VerbosityLevel::Verbose {
            for (input, output_path) in &summary.converted {
                output.push_str(&format!("  {} -> {}\n", input.display(), output_path.display()));
            }
            for (input, reason) in &summary.failed {
                output.push_str(&format!(
                    "  {} {}: {}\n",
                    self.colorize("failed", "31"),
                    input.display(),
                    reason
                ));
            }
        }
        output
    }
}

fn format_xml(results: &[&FileValidationResult]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Start(BytesStart::new("validations")))?;
    for result in results {
        writer.write_event(Event::Start(BytesStart::new("validation")))?;
        write_text(&mut writer, "file", &result.path.display().to_string())?;
        write_text(&mut writer, "valid", if result.is_valid() { "true" } else { "false" })?;

        writer.write_event(Event::Start(BytesStart::new("errors")))?;
        for error in &result.report.errors {
            write_text(&mut writer, "error", error)?;
        }
        writer.write_event(Event::End(BytesEnd::new("errors")))?;

        writer.write_event(Event::End(BytesEnd::new("validation")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("validations")))?;

    Ok(String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned())
}

fn write_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs_f64();
    if total_secs < 1.0 {
        format!("{}ms", duration.as_millis())
    } else if total_secs < 60.0 {
        format!("{:.2}s", total_secs)
    } else {
        let mins = (total_secs / 60.0) as u64;
        format!("{}m{:.1}s", mins, total_secs % 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidationReport;
    use std::path::PathBuf;

    fn result(path: &str, is_valid: bool, errors: &[&str]) -> FileValidationResult {
        FileValidationResult {
            path: PathBuf::from(path),
            report: ValidationReport {
                is_valid,
                errors: errors.iter().map(|e| e.to_string()).collect(),
            },
            duration: Duration::from_millis(3),
        }
    }

    fn results() -> ValidationResults {
        ValidationResults::aggregate(vec![
            result("good.nfo", true, &[]),
            result("bad.nfo", false, &["No xsi:schemaLocation attribute found"]),
        ])
    }

    fn output(format: OutputFormat, verbosity: VerbosityLevel) -> Output {
        Output::new(format, verbosity).with_colors(false)
    }

    #[test]
    fn test_text_output() {
        let text = output(OutputFormat::Text, VerbosityLevel::Normal)
            .format_results(&results())
            .unwrap();

        assert!(text.contains("File: good.nfo\nStatus: VALID ✓"));
        assert!(text.contains("File: bad.nfo\nStatus: INVALID ✗\nErrors:\n  - No xsi:schemaLocation"));
        assert!(text.contains("Validated 2 files: 1 valid, 1 invalid"));
    }

    #[test]
    fn test_quiet_shows_only_failures() {
        let text = output(OutputFormat::Text, VerbosityLevel::Quiet)
            .format_results(&results())
            .unwrap();
        assert!(!text.contains("good.nfo"));
        assert!(text.contains("bad.nfo"));
        assert!(!text.contains("Validated"));
    }

    #[test]
    fn test_warnings_on_valid_file() {
        let text = output(OutputFormat::Text, VerbosityLevel::Normal).format_file_result(&result(
            "m.nfo",
            true,
            &["Warning: Recommended field 'director' is missing for movie"],
        ));
        assert!(text.contains("Warnings:\n  - Warning: Recommended field 'director'"));
    }

    #[test]
    fn test_json_output() {
        let json = output(OutputFormat::Json, VerbosityLevel::Normal)
            .format_results(&results())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value[0]["file"], "good.nfo");
        assert_eq!(value[0]["valid"], true);
        assert_eq!(value[1]["valid"], false);
        assert_eq!(value[1]["errors"][0], "No xsi:schemaLocation attribute found");
    }

    #[test]
    fn test_xml_output() {
        let xml = output(OutputFormat::Xml, VerbosityLevel::Normal)
            .format_results(&results())
            .unwrap();
        let root = crate::document::parse_document(&xml).unwrap();

        assert_eq!(root.tag, "validations");
        assert_eq!(root.children.len(), 2);
        let bad = &root.children[1];
        assert_eq!(bad.child("valid").unwrap().text.as_deref(), Some("false"));
        assert_eq!(
            bad.child("errors").unwrap().children[0].text.as_deref(),
            Some("No xsi:schemaLocation attribute found")
        );
    }

    #[test]
    fn test_batch_summary() {
        let summary = BatchSummary {
            converted: vec![(PathBuf::from("a.nfo"), PathBuf::from("a.json"))],
            failed: vec![(PathBuf::from("b.nfo"), "XML syntax error: eof".to_string())],
        };

        let normal = output(OutputFormat::Text, VerbosityLevel::Normal).format_batch_summary(&summary);
        assert_eq!(normal, "converted 1, failed 1\n");

        let verbose =
            output(OutputFormat::Text, VerbosityLevel::Verbose).format_batch_summary(&summary);
        assert!(verbose.contains("failed b.nfo: XML syntax error: eof"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30.0s");
    }
}
