//! delve CLI entry point
//!
//! - `delve research "<query>"` - run a research session and print the report
//! - `delve config` - show or validate the configuration

use anyhow::Context;
use delve::cli::output::Output;
use delve::cli::{Cli, Commands};
use delve::research;
use delve::utils::toml_config::{DelveConfig, LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = run(cli, &output).await {
        output.error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let mut config = if cli.config.exists() {
        DelveConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        if cli.verbose {
            output.warning(&format!(
                "{} not found, using built-in defaults",
                cli.config.display()
            ));
        }
        DelveConfig::default()
    };

    init_tracing(&config.logging, cli.verbose);

    match cli.command {
        Commands::Config { validate } => {
            config.validate().context("invalid configuration")?;
            if validate {
                output.success(&format!("{} is valid", cli.config.display()));
            } else {
                output.config_summary(&config);
            }
            Ok(())
        }
        Commands::Research {
            query,
            mode,
            no_clarify,
            json,
        } => {
            if let Some(mode) = mode {
                config.research.apply_mode(mode);
            }
            if no_clarify {
                config.research.allow_clarification = false;
            }
            config.validate().context("invalid configuration")?;

            if cli.verbose {
                output.banner();
                output.config_summary(&config);
            }

            let result = research::run(&query, &config).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                output.report(&result);
                if cli.verbose {
                    output.run_summary(&result);
                }
            }
            Ok(())
        }
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let default_level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("delve={}", default_level)));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
