mod child;
mod config;
mod idle;
mod resolve;
mod runner;
mod signals;

use clap::Parser;
use config::{Config, TerminationMode};
use std::path::PathBuf;

/// Runs a command only while the processor is otherwise idle: samples
/// system-wide idle time at a fixed interval and starts, stops, suspends or
/// resumes the command as load crosses the trigger threshold.
#[derive(Parser, Debug)]
#[command(name = "idlerun", version, about)]
pub struct Cli {
    /// Polling interval in seconds
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,

    /// Idle percentage above which the command runs
    #[arg(short, long, value_name = "PERCENT")]
    threshold: Option<f64>,

    /// Deactivate the command with KILL
    #[arg(short, long, conflicts_with = "suspend")]
    kill: bool,

    /// Deactivate the command with TERM (default)
    #[arg(short = 's', long, conflicts_with = "suspend")]
    term: bool,

    /// Suspend the command with STOP and resume it with CONT
    #[arg(short = 'z', long)]
    suspend: bool,

    /// Settings file path (default idlerun.toml, skipped when absent)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate settings and print them resolved, don't run
    #[arg(long)]
    dry_run: bool,

    /// Extra logging (per-tick decisions, lifecycle operations)
    #[arg(short, long)]
    verbose: bool,

    /// Command to run while idle, with its arguments
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<String>,
}

/// Resolve every setting the loop needs: built-in defaults, then the
/// settings file, then command-line flags, plus the command itself.
fn build_config(cli: &Cli) -> Result<Config, String> {
    let file = match &cli.config {
        Some(path) => config::load_file(path).map_err(|e| e.to_string())?,
        None => config::load_default_file().map_err(|e| e.to_string())?,
    };
    let mode = TerminationMode::from_flags(cli.kill, cli.term, cli.suspend);

    let name = cli
        .command
        .first()
        .ok_or_else(|| "no command given".to_string())?;
    let command = resolve::find_executable(name).map_err(|e| e.to_string())?;
    let mut args = cli.command.clone();
    args[0] = command.display().to_string();

    Config::assemble(
        file,
        cli.interval,
        cli.threshold,
        mode,
        cli.verbose,
        command,
        args,
    )
    .map_err(|e| e.to_string())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("idlerun: {}", message);
            std::process::exit(1);
        }
    };

    let default_filter = if config.verbose {
        "idlerun=debug"
    } else {
        "idlerun=warn"
    };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.parse().unwrap()),
        )
        .init();

    tracing::debug!(?config, "resolved settings");

    if cli.dry_run {
        println!("idlerun v{}", env!("CARGO_PKG_VERSION"));
        println!("Interval:  {}s", config.interval_secs);
        println!("Threshold: {}%", config.threshold_percent);
        println!("Mode:      {}", config.mode.as_str());
        println!("Command:   {}", config.args.join(" "));
        println!("Dry run: settings validated, not running.");
        return;
    }

    let mut monitor = match idle::IdleMonitor::open() {
        Ok(monitor) => monitor,
        Err(e) => {
            tracing::error!(error = %e, "cannot open tick source");
            std::process::exit(-e.errno());
        }
    };
    let mut controller = child::ProcessController::new(&config);

    tracing::info!(
        command = %config.command.display(),
        interval_secs = config.interval_secs,
        threshold = config.threshold_percent,
        mode = config.mode.as_str(),
        "idlerun starting"
    );

    if let Err(e) = runner::run(&config, &mut monitor, &mut controller).await {
        tracing::error!(error = %e, "fatal error, exiting");
        std::process::exit(-e.errno());
    }
}
