//! Solace CLI and HTTP server entry point.
//!
//! Binary name: `solace`
//!
//! Parses CLI arguments, initializes tracing, then either prints the
//! effective configuration or starts the streaming chat server.

mod http;
mod state;

use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use tracing::Instrument;

use solace_core::admission::SweepScheduler;
use solace_infra::config::{CONFIG_FILE, load_global_config, render_config};
use solace_infra::filesystem::resolve_data_dir;
use solace_observe::fields::SPAN_SERVE;
use solace_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};

use state::AppState;

/// Streaming response backend for the journaling chat app.
#[derive(Parser)]
#[command(name = "solace", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Suppress all output except errors.
    #[arg(long, global = true)]
    quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on.
        #[arg(long, short, default_value_t = 8080)]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Export spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,

        /// Emit logs as JSON lines.
        #[arg(long)]
        json_logs: bool,

        /// Keep transcripts in memory instead of SQLite.
        #[arg(long)]
        no_persist: bool,
    },

    /// Print the effective configuration.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (otel, json_logs) = match &cli.command {
        Commands::Serve {
            otel, json_logs, ..
        } => (*otel, *json_logs),
        Commands::Config => (false, false),
    };
    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), otel, json_logs)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Config => {
            let data_dir = resolve_data_dir();
            let config = load_global_config(&data_dir).await;
            let rendered = render_config(&config)?;
            if !cli.quiet {
                println!(
                    "{}",
                    console::style(format!("# {}", data_dir.join(CONFIG_FILE).display())).dim()
                );
            }
            print!("{rendered}");
        }

        Commands::Serve {
            port,
            host,
            no_persist,
            ..
        } => {
            let state = AppState::init(!no_persist).await?;

            let sweeper = SweepScheduler::new(state.admission().clone());
            sweeper.start();

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            if !cli.quiet {
                println!(
                    "  {} Solace listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!(
                    "  {} upstream {} ({})",
                    console::style("↳").dim(),
                    console::style(&state.config.upstream.base_url).cyan(),
                    state.pipeline.generator_name()
                );
                println!(
                    "  {} data {}{}",
                    console::style("↳").dim(),
                    console::style(state.data_dir.display()).cyan(),
                    if state.transcripts.is_some() { "" } else { " (transcripts in memory)" }
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }

            let router = http::router::build_router(state.clone());
            let served = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(shutdown_signal())
            .into_future()
            .instrument(tracing::info_span!(SPAN_SERVE, %addr))
            .await;

            sweeper.stop().await;
            state.close().await;
            served?;

            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
