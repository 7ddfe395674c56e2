use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pipwatch_core::TimerConfig;
use pipwatch_timer::{format_elapsed, AppContext};

mod interactive;

use interactive::Output;

#[derive(Parser)]
#[command(name = "pipwatch")]
#[command(about = "pipwatch - a shared stopwatch you can drive from a terminal", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, env = "PIPWATCH_LOG")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the interactive stopwatch
    Run(RunArgs),
    /// Format a millisecond count the way the stopwatch displays it
    Format {
        /// Elapsed milliseconds
        millis: u64,
    },
    /// Show version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Print JSON snapshots instead of the live display
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Update loop cadence in milliseconds (overrides PIPWATCH_TICK_INTERVAL_MS)
    #[arg(long = "tick-ms")]
    tick_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Format { millis } => {
            println!("{}", format_elapsed(millis));
            Ok(())
        }
        Commands::Version => {
            println!("pipwatch v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(args) => {
            let mut config =
                TimerConfig::from_env().context("failed to load pipwatch configuration")?;
            if let Some(level) = cli.log_level {
                config.log_level = level;
            }
            if let Some(tick_ms) = args.tick_ms {
                anyhow::ensure!(tick_ms > 0, "--tick-ms must be greater than zero");
                config = config.with_tick_interval(Duration::from_millis(tick_ms));
            }

            if let Err(err) = pipwatch_core::logging::init_tracing(Some(&config.log_level)) {
                eprintln!("failed to initialise tracing: {err}");
            }

            let ctx = AppContext::new(config).context("failed to build stopwatch")?;
            let output = if args.json { Output::Json } else { Output::Text };
            interactive::run(ctx, output).await
        }
    }
}
