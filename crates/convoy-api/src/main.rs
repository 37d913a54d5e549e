//! Convoy CLI and control API entry point.
//!
//! Binary name: `convoy`
//!
//! Parses CLI arguments, initializes tracing, then either validates the
//! configuration directory (`check`) or serves the control API and runs the
//! delivery loop (`serve`).

mod cli;
mod http;
mod state;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use convoy_observe::tracing_setup::{init_tracing, shutdown_tracing, LogFormat};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    if let Err(err) = init_tracing(cli.verbose, format, cli.otel) {
        eprintln!("Warning: failed to initialize tracing: {err}");
    }
    install_panic_hook();

    let result = match cli.command {
        Commands::Check => cli::check::check(&cli.config_dir, cli.json).await,
        Commands::Serve {
            port,
            host,
            no_autostart,
        } => serve(cli.config_dir, &host, port, no_autostart).await,
    };

    shutdown_tracing();
    result
}

async fn serve(config_dir: PathBuf, host: &str, port: u16, no_autostart: bool) -> anyhow::Result<()> {
    let state = AppState::init(config_dir).await?;

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!(
        "  {} Convoy control API listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!(
        "  {} Configuration from {}",
        console::style("📂").bold(),
        console::style(state.config_dir.display()).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let autostart_delay = state.settings.autostart_delay_secs;
    if !no_autostart && autostart_delay > 0 {
        println!(
            "  {} Delivery starts in {autostart_delay}s",
            console::style("🚀").bold()
        );
        tokio::spawn(autostart(state.clone(), Duration::from_secs(autostart_delay)));
    }

    let router = http::router::build_router(state.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(state.shutdown.clone()))
        .await?;

    state.engine.shutdown().await;
    println!("\n  Server stopped.");
    Ok(())
}

/// Start the delivery loop once the server has been up for `delay`.
async fn autostart(state: AppState, delay: Duration) {
    tokio::select! {
        _ = state.shutdown.cancelled() => return,
        _ = tokio::time::sleep(delay) => {}
    }

    match state.engine.start().await {
        Ok(outcome) => tracing::info!(?outcome, "Autostart"),
        Err(err) => tracing::warn!(
            error = %err,
            "Autostart failed; fix the configuration and POST /api/v1/start"
        ),
    }
}

/// Log panics through tracing. Tasks survive their own panics (the loop
/// catches tick panics, tokio catches task panics), so nothing here aborts.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        tracing::error!(panic = %info, "Unhandled panic");
    }));
}

/// Wait for Ctrl+C or SIGTERM, then cancel `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
