//! tfresolve CLI entry point.
//!
//! This binary provides the command-line interface for tfresolve.

use clap::Parser as _;
use futures::future::join_all;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tfresolve::cli::{Cli, Commands, ParseArgs};
use tfresolve::parser::{Collaborators, Parser};
use tfresolve::progress::{BufferedWarnings, IndicatifProgress, ProgressReporter};
use tfresolve::reporter::{ProjectReport, Reporter};
use tfresolve::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(exit_code) => exit_code,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");

            eprintln!("Error: {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut i = 0;
                while let Some(cause) = source {
                    eprintln!("  {i}: {cause}");
                    source = cause.source();
                    i += 1;
                }
            }

            ExitCode::from(1)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let base_level = match verbose {
                0 => "warn",
                1 => "info",
                2 => "debug",
                _ => "trace",
            };
            // tfresolve at the requested level, everything else at warn
            EnvFilter::new(format!("warn,tfresolve={base_level}"))
        })
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    tracing::debug!("Loading configuration");
    let mut config = load_config(&cli)?;

    match cli.command {
        Commands::Parse(args) => {
            config.merge_cli_args(&args);
            parse(&config, &args).await
        }

        Commands::Init => {
            let config_path = std::path::Path::new("tfresolve.yaml");

            if config_path.exists() {
                anyhow::bail!("Configuration file already exists: {}", config_path.display());
            }

            std::fs::write(config_path, Config::example_yaml())?;
            println!("Created example configuration: tfresolve.yaml");
            Ok(ExitCode::from(0))
        }

        Commands::Validate(args) => {
            let config_content = std::fs::read_to_string(&args.config)?;
            match Config::from_yaml(&config_content) {
                Ok(_) => {
                    println!("Configuration is valid: {}", args.config.display());
                    Ok(ExitCode::from(0))
                }
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    Ok(ExitCode::from(1))
                }
            }
        }
    }
}

async fn parse(config: &Config, args: &ParseArgs) -> anyhow::Result<ExitCode> {
    // spinners of concurrent parsers would garble each other
    let progress: Option<Arc<dyn ProgressReporter>> = if args.progress && args.paths.len() == 1 {
        Some(Arc::new(IndicatifProgress))
    } else {
        None
    };

    let projects: Vec<(Parser, BufferedWarnings)> = args
        .paths
        .iter()
        .map(|path| {
            let warnings = BufferedWarnings::new();
            let parser = Parser::with_collaborators(
                path.clone(),
                &config.parser,
                Collaborators {
                    progress: progress.clone(),
                    warning: Some(warnings.sink()),
                    ..Collaborators::default()
                },
            );
            (parser, warnings)
        })
        .collect();

    tracing::debug!(projects = projects.len(), "Parsing projects");
    let results = join_all(projects.iter().map(|(parser, _)| parser.parse_directory())).await;

    let mut exit_code = 0;
    let reports: Vec<ProjectReport> = projects
        .iter()
        .zip(results)
        .map(|((parser, warnings), result)| {
            if let Err(e) = &result {
                tracing::debug!(path = %parser.path().display(), error = %e, "Project failed");
                if exit_code == 0 {
                    exit_code = e.exit_code();
                }
            }
            ProjectReport::new(parser.path().to_path_buf(), warnings.take(), &result)
        })
        .collect();

    let report = Reporter::new(config).generate(&reports, args.format)?;

    if let Some(output_path) = &args.output {
        std::fs::write(output_path, &report)?;
        tracing::info!(path = %output_path.display(), "Report written");
    } else {
        println!("{report}");
    }

    Ok(ExitCode::from(u8::try_from(exit_code).unwrap_or(1)))
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    if let Some(ref config_path) = cli.config {
        tracing::debug!(path = %config_path.display(), "Loading configuration from explicit path");
        let content = std::fs::read_to_string(config_path)?;
        return Ok(Config::from_yaml(&content)?);
    }

    let default_paths = ["tfresolve.yaml", "tfresolve.yml", ".tfresolve.yaml"];
    for path in &default_paths {
        if std::path::Path::new(path).exists() {
            tracing::debug!(path = %path, "Found configuration file");
            let content = std::fs::read_to_string(path)?;
            return Ok(Config::from_yaml(&content)?);
        }
    }

    tracing::debug!("No configuration file found, using default configuration");
    Ok(Config::default())
}
