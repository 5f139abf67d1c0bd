use clap::Parser;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use traderup::cli::{self, Cli};
use traderup::config::AppConfig;
use traderup::coordination::{
    install_signal_handlers, select_port, NamedGate, ProcessRegistry, Shutdown,
};
use traderup::error::{Result, TraderError};
use traderup::extension::TraderExtension;
use traderup::logging::init_logging;

const ISSUES_URL: &str = "https://github.com/thiagochfc/TraderUp/issues/new";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            wait_for_enter();
            return ExitCode::FAILURE;
        }
    };
    let _log_guard = init_logging(&config.logging);

    if let Err(e) = cli::print_banner() {
        error!("Failed to draw banner: {}", e);
    }

    let outcome = run(cli, config).await;
    if let Err(e) = &outcome {
        report(e);
    }

    wait_for_enter();
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load_from(&cli.config)?;

    if let Some(host) = &cli.host {
        config.connection.host = host.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }

    config
        .validate()
        .map_err(|problems| TraderError::InvalidConfig(problems.join("; ")))?;
    Ok(config)
}

async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let shutdown = Shutdown::new();
    install_signal_handlers(shutdown.clone());

    let runtime_dir = config.coordination.resolved_runtime_dir();
    let registry = ProcessRegistry::register(&runtime_dir)?;
    let port = select_port(
        config.connection.base_port,
        registry.siblings(),
        config.coordination.max_siblings,
    )?;
    let port = cli.port.unwrap_or(port);

    let gate = NamedGate::create_or_attach(
        &runtime_dir,
        &config.coordination.gate_name,
        config.coordination.gate_poll(),
    )?;
    info!(role = %gate.role(), port, "Process registered");

    let extension = TraderExtension::connect(config, port, gate, shutdown.clone()).await?;
    extension.start().await?;

    let username = choose(
        cli.user,
        "Which user do you want to trade with?",
        extension.users_to_trade().await,
        &shutdown,
    )
    .await?;
    let furniture = choose(
        cli.furniture,
        "Which furniture do you want to trade with?",
        extension.furniture_to_trade().await,
        &shutdown,
    )
    .await?;

    extension.trade(&username, &furniture).await
}

/// Use the preselected value, or prompt off the runtime threads while still honouring Ctrl+C
async fn choose(
    preset: Option<String>,
    title: &'static str,
    choices: Vec<String>,
    shutdown: &Arc<Shutdown>,
) -> Result<String> {
    if let Some(value) = preset {
        return Ok(value);
    }

    let prompt = tokio::task::spawn_blocking(move || cli::select(title, &choices));
    tokio::select! {
        joined = prompt => joined.map_err(|e| TraderError::Internal(e.to_string()))?,
        _ = shutdown.cancelled() => Err(shutdown.take_error()),
    }
}

fn report(e: &TraderError) {
    if e.is_operational() {
        error!("{}", e);
    } else {
        error!(error = ?e, "{}", e);
        error!("Unexpected failure, please report it at {}", ISSUES_URL);
    }
}

fn wait_for_enter() {
    println!("Press Enter to exit...");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}
