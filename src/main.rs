//! Mantle - minimal reparenting window manager
//!
//! Frames every top-level window in a bordered parent that can be dragged
//! and raised with button 3, and routes a handful of Alt key bindings.

mod cli;
mod config;
mod error;
mod launcher;
mod shared;
mod signals;
mod wm;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::config::Config;
use crate::error::{exit_code, WmError};
use crate::launcher::DetachedLauncher;
use crate::signals::ShutdownSignal;
use crate::wm::settings::WindowManagerSettings;
use crate::wm::x11::X11Server;
use crate::wm::{Outcome, WindowManager};

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "mantle=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    // Children started from key bindings must reach the same server.
    if let Some(display) = &args.display {
        // SAFETY: no other threads exist yet.
        unsafe { std::env::set_var("DISPLAY", display) };
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::from(exit_code::FATAL);
        }
    };

    match runtime.block_on(run(args)) {
        Ok(outcome) => {
            info!("Mantle exited ({:?})", outcome);
            ExitCode::from(exit_code::CLEAN)
        }
        Err(err) => {
            error!("{:#}", err);
            let code = err
                .downcast_ref::<WmError>()
                .map_or(exit_code::FATAL, WmError::exit_code);
            ExitCode::from(code)
        }
    }
}

async fn run(args: Args) -> Result<Outcome> {
    info!("Starting Mantle Window Manager");

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(terminal) = args.terminal {
        config.terminal = terminal;
    }
    let settings = WindowManagerSettings::from(&config);

    // Setup signal handlers for graceful shutdown
    let shutdown = ShutdownSignal::new();
    signals::watch(shutdown.clone()).context("Failed to install signal handlers")?;

    let display = args.display;
    // The event loop blocks on the X connection; keep it off the async workers.
    tokio::task::spawn_blocking(move || -> Result<Outcome> {
        let server = X11Server::connect(display.as_deref(), shutdown.clone())
            .context("Failed to connect to X server")?;
        let mut wm = WindowManager::new(server, DetachedLauncher::new(), settings, shutdown)
            .context("Failed to initialize window manager")?;
        let outcome = wm.run()?;
        info!("{} fault(s) during session", wm.errors().count());
        Ok(outcome)
    })
    .await
    .context("Event loop panicked")?
}
