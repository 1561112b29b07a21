//! Turnstile check-in console
//!
//! Reads ticket codes from stdin, one per line, and prints the outcome of
//! each. In manual mode `:`-prefixed lines are commands; in scan mode every
//! line is scanner text. Logs go to stderr so stdout stays readable.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use turnstile_checkin::console::{self, Command};
use turnstile_checkin::{session, CheckinStore, Config, TerminalSink};
use turnstile_core::environment::{Clock, SystemClock};
use turnstile_runtime::StoreError;

/// How long to wait for pending writes at exit
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "turnstile_checkin=info,turnstile_runtime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        tickets = %config.tickets_path.display(),
        data_dir = %config.data_dir.display(),
        mode = %config.input_mode,
        "Starting check-in"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (store, source) = session::from_config(&config, Arc::new(TerminalSink), Arc::clone(&clock));
    session::start(&store, &source).await?;

    println!("{}", store.state(|s| s.status.clone()).await);
    let help = console::help(config.input_mode);
    println!("{help}");

    // Input problems end the loop but never skip the shutdown below, which
    // lets pending writes of the used set finish.
    let mut input = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        let line = match console::read_line(&mut input, &mut buf).await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                tracing::error!(%error, "Console input failed");
                break;
            },
        };

        match Command::parse(&line, config.input_mode) {
            Command::Quit => break,
            Command::Status => print_status(&store, clock.as_ref()).await,
            Command::Unknown(name) => println!("Unknown command :{name}. {help}"),
            command => {
                if let Some(action) = command.into_action() {
                    if let Err(error) = store.send(action).await {
                        tracing::error!(%error, "Check-in store stopped accepting input");
                        break;
                    }
                }
            },
        }
    }

    match store.shutdown(SHUTDOWN_TIMEOUT).await {
        Ok(()) => {},
        Err(StoreError::ShutdownTimeout(pending)) => {
            tracing::warn!(pending, "Exited with effects still pending");
        },
        Err(error) => return Err(error.into()),
    }

    Ok(())
}

async fn print_status(store: &CheckinStore, clock: &dyn Clock) {
    let (status, valid, used, report) = store
        .state(|s| {
            (
                s.status.clone(),
                s.validator.valid_count(),
                s.validator.used_count(),
                s.health_report(clock.now()),
            )
        })
        .await;

    println!("{status}");
    println!("Valid tickets: {valid}, used on this device: {used}");
    println!("Health: {}", report.status);
    for check in &report.checks {
        println!("  {check}");
    }
}
