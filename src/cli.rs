use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::output::OutputFormat;

/// Verbosity levels for output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Only show failures
    Quiet,
    /// Show standard information
    #[default]
    Normal,
    /// Show detailed information
    Verbose,
}

/// Validate and convert NFO Standard documents
#[derive(Parser, Debug, Clone)]
#[command(name = "nfo")]
#[command(about = "Validate NFO Standard documents and convert them between XML and JSON")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Only report failures
    #[arg(short = 'q', long = "quiet", global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Validate NFO files against the schema named in their xsi:schemaLocation
    Validate(ValidateArgs),
    /// Convert NFO XML to JSON
    #[command(name = "to-json")]
    ToJson(ToJsonArgs),
    /// Convert JSON to NFO XML
    #[command(name = "to-xml")]
    ToXml(ToXmlArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Files or directories to validate
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Also report missing recommended fields
    #[arg(long = "strict")]
    pub strict: bool,

    /// Descend into subdirectories
    #[arg(short = 'r', long = "recursive")]
    pub recursive: bool,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Resolve schemas from --schema-dir instead of the network
    #[arg(long = "offline")]
    pub offline: bool,

    /// Directory holding local copies of the schemas
    #[arg(long = "schema-dir")]
    pub schema_dir: Option<PathBuf>,

    /// Schema download timeout in seconds
    #[arg(long = "timeout")]
    pub timeout: Option<u64>,

    /// Number of files validated concurrently
    #[arg(long = "threads")]
    pub threads: Option<usize>,

    /// Exclude paths matching a glob pattern
    #[arg(short = 'e', long = "exclude", action = clap::ArgAction::Append)]
    pub exclude: Vec<String>,

    /// File extensions picked up in directories (e.g. 'nfo,xml')
    #[arg(long = "extension", value_delimiter = ',')]
    pub extensions: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct ToJsonArgs {
    /// NFO file, directory, or '-' for stdin
    pub input: String,

    /// Output file (or directory when converting a directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Hoist the media element to the top level
    #[arg(short = 'c', long = "compact")]
    pub compact: bool,

    /// Leave attributes out of the JSON
    #[arg(long = "no-attributes")]
    pub no_attributes: bool,

    /// Drop empty values
    #[arg(long = "simplify")]
    pub simplify: bool,

    /// Write JSON on a single line
    #[arg(long = "no-pretty")]
    pub no_pretty: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ToXmlArgs {
    /// JSON file, directory, or '-' for stdin
    pub input: String,

    /// Output file (or directory when converting a directory)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Media type used when the JSON has no "type" key
    #[arg(short = 't', long = "type")]
    pub media_type: Option<String>,

    /// Write XML without indentation
    #[arg(long = "no-pretty")]
    pub no_pretty: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl ValidateArgs {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(threads) = self.threads
            && threads == 0
        {
            return Err("Number of threads must be greater than 0".to_string());
        }
        if self.timeout == Some(0) {
            return Err("Timeout must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_validate_parsing() {
        let cli = parse(&[
            "nfo", "validate", "a.nfo", "lib/", "--strict", "-r", "-f", "json", "--extension",
            "nfo,xml", "-e", "**/extras",
        ]);

        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.paths, vec![PathBuf::from("a.nfo"), PathBuf::from("lib/")]);
        assert!(args.strict);
        assert!(args.recursive);
        assert_eq!(args.format, Some(OutputFormat::Json));
        assert_eq!(args.extensions, vec!["nfo", "xml"]);
        assert_eq!(args.exclude, vec!["**/extras"]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_a_path() {
        assert!(Cli::try_parse_from(["nfo", "validate"]).is_err());
    }

    #[test]
    fn test_offline_flags() {
        let cli = parse(&["nfo", "validate", "a.nfo", "--offline", "--schema-dir", "xsd"]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert!(args.offline);
        assert_eq!(args.schema_dir, Some(PathBuf::from("xsd")));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let cli = parse(&["nfo", "validate", "a.nfo", "--threads", "0"]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_to_json_parsing() {
        let cli = parse(&["nfo", "to-json", "-", "-c", "--no-attributes", "--simplify", "-o", "out.json"]);
        let Command::ToJson(args) = cli.command else {
            panic!("expected to-json");
        };
        assert_eq!(args.input, "-");
        assert!(args.compact);
        assert!(args.no_attributes);
        assert!(args.simplify);
        assert!(!args.no_pretty);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_to_xml_parsing() {
        let cli = parse(&["nfo", "to-xml", "movie.json", "-t", "tvshow", "--no-pretty"]);
        let Command::ToXml(args) = cli.command else {
            panic!("expected to-xml");
        };
        assert_eq!(args.media_type.as_deref(), Some("tvshow"));
        assert!(args.no_pretty);
    }

    #[test]
    fn test_global_verbosity_flags() {
        assert!(parse(&["nfo", "-q", "validate", "a"]).quiet);
        assert!(parse(&["nfo", "validate", "a", "-v"]).verbose);
        assert!(Cli::try_parse_from(["nfo", "-q", "-v", "validate", "a"]).is_err());
    }
}
