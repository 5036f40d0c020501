//! find-device-logger - fixed-interval location sampler

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use find_device_logger::cli::LoggerArgs;
use find_device_logger::config::Config;
use find_device_logger::db::Store;
use find_device_logger::error::AppError;
use find_device_logger::logging;
use find_device_logger::poller;
use find_device_logger::provider::ICloudProvider;
use find_device_logger::session::SessionManager;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = LoggerArgs::parse();

    let mut config = match Config::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_terminal() => {
            tracing::error!("Fatal: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("Stopped after unrecoverable startup error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: LoggerArgs, config: Config) -> Result<(), AppError> {
    tracing::info!("Starting find-device-logger...");

    let store = Store::connect(&config.database.path).await?;
    let provider = ICloudProvider::new(&config.provider)?;
    let manager = SessionManager::new(
        provider,
        Duration::from_secs(config.poll.login_backoff_secs),
    );
    let credentials = args.credentials();

    let poller = tokio::select! {
        prepared = poller::prepare_with_retry(
            &manager,
            store.clone(),
            &credentials,
            args.device_name.as_deref(),
            config.poll.period_minutes,
        ) => match prepared {
            Ok(poller) => poller,
            Err(e) => {
                store.close().await;
                return Err(e);
            }
        },
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted during startup");
            store.close().await;
            return Ok(());
        }
    };

    tokio::select! {
        _ = poller.start() => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted, shutting down"),
    }

    store.close().await;
    Ok(())
}
