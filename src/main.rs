use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poolprobe::artifact::Artifact;
use poolprobe::config::{LoggingConfig, PoolprobeConfig};
use poolprobe::report;

#[derive(Parser)]
#[command(
    name = "poolprobe",
    about = "Concurrent upload load tester for worker-pool backed endpoints",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one artifact N times concurrently and report the results
    Run {
        /// Artifact to upload (image or PDF)
        #[arg(long, short = 'f')]
        file: PathBuf,

        /// Number of simultaneous requests
        #[arg(long, short = 'n', default_value_t = 5)]
        count: u32,

        /// Override the configured upload endpoint
        #[arg(long, env = "POOLPROBE_ENDPOINT")]
        endpoint: Option<String>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// Start the HTTP control API
    Serve {
        /// Bind address (defaults to api.listen_address)
        #[arg(long)]
        bind: Option<String>,
    },
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = PoolprobeConfig::resolve(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run {
            file,
            count,
            endpoint,
            json,
        } => {
            if let Some(endpoint) = endpoint {
                config.target.endpoint = endpoint;
            }
            tracing::info!(file = %file.display(), %count, endpoint = %config.target.endpoint, "Running load test");
            run_load_test(&config, &file, count, json).await?;
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.api.listen_address.clone());
            tracing::info!(%bind, "Starting poolprobe API");
            poolprobe::serve(&bind, &config).await?;
        }
    }

    Ok(())
}

async fn run_load_test(config: &PoolprobeConfig, file: &Path, count: u32, json: bool) -> Result<()> {
    config.limits.check(count).map_err(anyhow::Error::msg)?;
    let artifact = Artifact::from_path(file).await?;

    let mut tester = poolprobe::http_tester(config)?;
    tester.try_start(artifact, count)?;
    let mut view = tester.subscribe().context("run did not start")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut interrupted = false;
    loop {
        {
            let state = view.borrow_and_update();
            if !json {
                eprintln!("{}", report::format_progress(state.summary()));
            }
            if state.summary().is_finished() {
                break;
            }
        }

        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                tester.stop();
                interrupted = true;
                break;
            }
        }
    }

    let snapshot = tester.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", report::format_report(&snapshot));
    }

    if interrupted {
        tracing::warn!(
            completed = snapshot.summary.completed,
            total = snapshot.summary.total,
            "Interrupted; reporting partial results, in-flight requests were left running"
        );
    }
    Ok(())
}
