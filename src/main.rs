use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use nfo_standard::cli::{Cli, Command, ToJsonArgs, ToXmlArgs, ValidateArgs, VerbosityLevel};
use nfo_standard::config::{Config, ConfigManager};
use nfo_standard::converter::{self, ConversionOptions, Direction};
use nfo_standard::file_discovery::FileDiscovery;
use nfo_standard::output::{Output, OutputFormat};
use nfo_standard::schema_loader::SchemaLoader;
use nfo_standard::validator::NfoValidator;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "nfo=debug,nfo_standard=debug"
    } else {
        "nfo=info,nfo_standard=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Returns `Ok(false)` when some document failed validation or conversion
async fn run(cli: Cli) -> Result<bool> {
    let config = ConfigManager::load_config(&cli).await?;
    let verbosity = ConfigManager::verbosity(&config);
    debug!("Effective configuration: {:?}", config);

    match &cli.command {
        Command::Validate(args) => validate(args, &config, verbosity).await,
        Command::ToJson(args) => to_json(args, &config, verbosity).await,
        Command::ToXml(args) => to_xml(args, &config, verbosity).await,
    }
}

async fn validate(args: &ValidateArgs, config: &Config, verbosity: VerbosityLevel) -> Result<bool> {
    args.validate().map_err(anyhow::Error::msg)?;

    let loader = SchemaLoader::from_settings(
        ConfigManager::offline_schema_dir(config),
        ConfigManager::http_client_config(config),
    )?;
    let validator = NfoValidator::new(loader, ConfigManager::validation_config(config));

    let mut discovery = FileDiscovery::new()
        .with_recursive(args.recursive)
        .with_exclude_patterns(&args.exclude)?;
    if !args.extensions.is_empty() {
        discovery = discovery.with_extensions(&args.extensions);
    }

    let mut files = Vec::new();
    for path in &args.paths {
        files.extend(discovery.discover_files(path).await?);
    }

    let results = validator.validate_files(files).await?;
    let rendered = Output::new(config.output.format, verbosity).format_results(&results)?;
    if !rendered.is_empty() {
        println!("{}", rendered.trim_end());
    }

    Ok(results.all_valid())
}

async fn to_json(args: &ToJsonArgs, config: &Config, verbosity: VerbosityLevel) -> Result<bool> {
    let defaults = ConfigManager::conversion_options(config);
    let options = ConversionOptions {
        compact: args.compact,
        include_attributes: defaults.include_attributes && !args.no_attributes,
        simplify: args.simplify,
        pretty: defaults.pretty && !args.no_pretty,
        ..defaults
    };
    convert(&args.input, args.output.as_deref(), Direction::XmlToJson, options, verbosity).await
}

async fn to_xml(args: &ToXmlArgs, config: &Config, verbosity: VerbosityLevel) -> Result<bool> {
    let defaults = ConfigManager::conversion_options(config);
    let options = ConversionOptions {
        pretty: defaults.pretty && !args.no_pretty,
        default_type: args.media_type.clone(),
        ..defaults
    };
    convert(&args.input, args.output.as_deref(), Direction::JsonToXml, options, verbosity).await
}

/// Convert stdin (`-`), a single file, or every matching file in a directory
async fn convert(
    input: &str,
    output: Option<&Path>,
    direction: Direction,
    options: ConversionOptions,
    verbosity: VerbosityLevel,
) -> Result<bool> {
    if input == "-" {
        let mut content = Vec::new();
        io::stdin()
            .read_to_end(&mut content)
            .context("failed to read stdin")?;
        write_converted(&direction.convert(&content, &options)?, output)?;
        return Ok(true);
    }

    let path = Path::new(input);
    if path.is_dir() {
        let files = FileDiscovery::new()
            .with_extensions(direction.source_extensions())
            .discover_files(path)
            .await?;
        let output_dir = output.map(Path::to_path_buf);

        let summary = tokio::task::spawn_blocking(move || {
            converter::convert_files(&files, direction, &options, output_dir.as_deref())
        })
        .await
        .context("conversion task failed")??;

        print!(
            "{}",
            Output::new(OutputFormat::Text, verbosity).format_batch_summary(&summary)
        );
        return Ok(summary.is_success());
    }

    let content = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let converted = direction
        .convert(&content, &options)
        .with_context(|| format!("failed to convert {}", path.display()))?;
    write_converted(&converted, output)?;
    Ok(true)
}

fn write_converted(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            debug!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", text)?;
        }
    }
    Ok(())
}
