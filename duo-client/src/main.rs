//! duo-client - terminal client for the Duo FD-discovery study
//!
//! Participants inspect dataset samples, mark cells that break the pattern
//! they see, and state which attributes determine which others.

use anyhow::Result;
use clap::Parser;
use duo_client::commands::Command;
use duo_client::{render, BackendClient, Driver};
use duo_common::session::Input;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level used until the config file has been read
const BOOTSTRAP_LOG_LEVEL: &str = "info";

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "duo-client")]
#[command(about = "Terminal client for the Duo FD-discovery study")]
#[command(version)]
struct Args {
    /// Backend base URL (overrides DUO_BACKEND_URL and the config file)
    #[arg(long)]
    backend_url: Option<String>,

    /// Participant email; skips the welcome prompt
    #[arg(long, env = "DUO_EMAIL")]
    email: Option<String>,

    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Subscriber goes up first so config loading can log
    let filter = init_tracing();

    info!(
        "Starting Duo client v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config = duo_common::config::resolve(args.backend_url.as_deref(), args.config.as_deref())?;
    if let Some(filter) = filter {
        filter.reload(EnvFilter::new(&config.log_level))?;
    }

    info!("Backend: {}", config.backend_url);
    info!(
        "Layout: {:?}, missing feedback: {:?}",
        config.settings.layout.kind, config.settings.missing_feedback
    );

    let client = BackendClient::new(&config.backend_url, config.settings.layout.kind)?;
    let mut driver = Driver::new(client, config.settings);

    if let Some(email) = args.email {
        if let Err(e) = driver.submit(Input::SubmitEmail(email)).await {
            warn!("Could not start with the given email: {}", e);
        }
    }
    print_screen(&driver);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while !driver.session().is_finished() {
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        match command {
            Command::Quit => break,
            Command::Help => println!("{}", render::help()),
            command => {
                if let Some(input) = command.into_input(driver.session()) {
                    if let Err(e) = driver.submit(input).await {
                        println!("{}", e);
                    }
                }
                print_screen(&driver);
            }
        }
    }

    if driver.session().is_finished() {
        info!("Session finished");
    } else {
        info!("Leaving before the study was finished");
    }
    Ok(())
}

/// Install the stderr subscriber
///
/// RUST_LOG wins over the configured level. Without it the subscriber starts
/// at [`BOOTSTRAP_LOG_LEVEL`] and the returned handle applies the configured
/// level once it is known.
fn init_tracing() -> Option<reload::Handle<EnvFilter, Registry>> {
    let (filter, from_config) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new(BOOTSTRAP_LOG_LEVEL), true),
    };
    let (filter, reload_handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
    from_config.then_some(reload_handle)
}

fn print_screen(driver: &Driver) {
    if let Some(failure) = driver.last_failure() {
        println!("! {}", failure);
    }
    print!("{}", render::screen(driver.session()));
}
