mod app;
mod config;
mod logging;
mod notify;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use opwatch_core::JobKind;
use opwatch_engine::{ControlAction, ServiceClient};
use opwatch_logging::{level_from_verbosity, op_error, op_info, op_warn};

use app::AppError;
use config::{load_config, AppConfig, DEFAULT_CONFIG_FILENAME};
use logging::LogDestination;

/// Watch and control library scan and dedupe jobs on a running backend.
#[derive(Debug, Parser)]
#[command(name = "opwatch", version, about)]
struct Cli {
    /// Config file; missing files fall back to defaults.
    #[arg(long, default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,

    /// Backend base URL, overriding the config file.
    #[arg(long)]
    base_url: Option<String>,

    /// Where log output goes, overriding the config file.
    #[arg(long, value_enum)]
    log: Option<LogDestination>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Poll both job kinds once and print their status.
    Status,
    /// Follow both job kinds until interrupted, announcing completions.
    Watch {
        /// Do not announce completed jobs.
        #[arg(long)]
        quiet: bool,
    },
    /// Start a job.
    Start {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Pause a running job.
    Pause {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Resume a paused job.
    Resume {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Stop a running job.
    Stop {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
    /// Clear a finished job's results.
    Clear {
        #[arg(value_parser = parse_kind)]
        kind: JobKind,
    },
}

impl Command {
    fn control(&self) -> Option<(JobKind, ControlAction)> {
        match *self {
            Command::Start { kind } => Some((kind, ControlAction::Start)),
            Command::Pause { kind } => Some((kind, ControlAction::Pause)),
            Command::Resume { kind } => Some((kind, ControlAction::Resume)),
            Command::Stop { kind } => Some((kind, ControlAction::Stop)),
            Command::Clear { kind } => Some((kind, ControlAction::Clear)),
            Command::Status | Command::Watch { .. } => None,
        }
    }
}

fn parse_kind(raw: &str) -> Result<JobKind, String> {
    JobKind::parse(raw).ok_or_else(|| format!("unknown job kind '{raw}', expected scan or dedupe"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let (mut app_config, config_error) = match load_config(&cli.config) {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };
    if let Some(base_url) = cli.base_url.clone() {
        app_config.base_url = base_url;
    }

    logging::initialize(
        cli.log.unwrap_or(app_config.log_destination),
        level_from_verbosity(cli.verbose),
    );
    if let Some(err) = config_error {
        op_warn!("{}; using defaults", err);
    }

    match execute(&cli, &app_config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            op_error!("{}", err);
            eprintln!("opwatch: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli, app_config: &AppConfig) -> Result<bool, AppError> {
    let settings = app_config
        .to_settings()
        .map_err(|source| AppError::InvalidBaseUrl {
            url: app_config.base_url.clone(),
            source,
        })?;
    op_info!("backend at {}", settings.base_url);

    // The engine only needs one thread; everything here is I/O bound.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = ServiceClient::new(settings)?;
        let succeeded = match &cli.command {
            Command::Status => {
                app::print_status(&client).await;
                true
            }
            Command::Watch { quiet } => {
                app::watch(&client, app_config.notify && !quiet).await;
                true
            }
            command => match command.control() {
                Some((kind, action)) => app::control(&client, kind, action).await,
                None => true,
            },
        };
        Ok::<bool, AppError>(succeeded)
    })
}
