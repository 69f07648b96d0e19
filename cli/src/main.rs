mod calllog;
mod config;
mod error;
mod phone;
mod serial;
mod webhook;

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use callscreen_core::hooks::NoopNotifier;
use callscreen_core::{CallHandler, Hooks, Notifier};
use clap::Parser;
use tokio::runtime::Handle;
use tracing::{error, info};

use crate::calllog::CsvCallLog;
use crate::config::Cli;
use crate::error::CliError;
use crate::phone::E164Normalizer;
use crate::serial::SerialChannel;
use crate::webhook::WebhookNotifier;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; flags and the real environment still apply
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = cli.call_settings()?;
    let channel = SerialChannel::open(&cli.port, cli.baud)?;
    info!(port = %cli.port, baud = cli.baud, "Modem connected");

    let hooks = Hooks {
        log: Box::new(CsvCallLog::new(cli.log_file.clone())),
        notifier: notifier(cli.webhook_url.as_deref())?,
        normalizer: Box::new(E164Normalizer::new(cli.country_code.clone(), cli.trunk_prefix.clone())),
    };

    let stop = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let stop = Arc::clone(&stop);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, finishing current step");
                stop.store(true, Ordering::Relaxed);
            }
        }
    });

    tokio::task::spawn_blocking(move || -> Result<(), CliError> {
        let mut handler = CallHandler::new(channel, &settings, hooks).with_stop_flag(stop);
        handler.initialize()?;
        handler.run()?;
        // dropping the channel closes the port
        drop(handler.into_channel());
        info!("Serial port closed");
        Ok(())
    })
    .await?
}

fn notifier(url: Option<&str>) -> Result<Box<dyn Notifier>, CliError> {
    match url.filter(|url| !url.is_empty()) {
        Some(url) => {
            info!(url, "Webhook notifications enabled");
            Ok(Box::new(WebhookNotifier::new(url, Handle::current())?))
        }
        None => Ok(Box::new(NoopNotifier)),
    }
}
