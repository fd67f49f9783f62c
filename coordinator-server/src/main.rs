//! coordinator-server — demo/reference entry point for the coordinator
//! engine (spec.md §6 "CLI (front-end collaborator, sketched only)").
//!
//! This is explicitly a reference binary standing in for the full external
//! CLI: it selects between the two built-in reference handlers
//! (`coordinator_server::demo`) rather than a real compiled-user-code
//! substrate binding, and reads its knobs from flags/env rather than a
//! config file loader — both out of scope per spec.md §1. The shape —
//! parse flags, build the engine, serve, report the outcome with the exit
//! code spec.md §7 prescribes — follows `bpmn-lite-server`/`sem_os_server`'s
//! binaries.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use coordinator_core::substrate::local::LocalSubstrate;
use coordinator_core::{Workload, WorkloadConfig, WorkloadOutcome};
use coordinator_server::demo;
use coordinator_server::router::build_router;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Demo {
    /// Computes n! via repeated checkpointing (spec.md §8 scenario 1).
    Factorial,
    /// Exits immediately with the application event echoed back.
    Echo,
}

/// Runs one workload to completion against a built-in reference handler.
///
/// Concrete substrate bindings (a local subprocess runner, a cloud lambda
/// runner) and the compiler that produces continuation-taking user code are
/// external collaborators (spec.md §1) — this binary exists to drive the
/// coordinator engine end to end without either.
#[derive(Parser, Debug)]
#[command(name = "coordinator-server", version, about)]
struct Cli {
    /// Which built-in reference handler to run as the main process.
    #[arg(long, value_enum, default_value = "factorial")]
    demo: Demo,

    /// JSON application event passed to the main process.
    #[arg(long, default_value = "{\"n\": 5}")]
    app_event: String,

    /// Address the RPC endpoint binds to.
    #[arg(long, env = "COORD_RPC_BIND_ADDR", default_value = "127.0.0.1:8080")]
    rpc_bind_addr: String,

    /// Milliseconds the RPC endpoint waits for a dispatched call before
    /// replying would-block.
    #[arg(long, env = "COORD_RPC_TIMEOUT_MS", default_value_t = 500)]
    rpc_timeout_ms: u64,

    /// Seconds a single handler invocation may run before being treated as
    /// timed out.
    #[arg(long, env = "COORD_INVOCATION_TIMEOUT_SECS", default_value_t = 15)]
    invocation_timeout_secs: u64,

    /// Consecutive handler crashes tolerated before the process is declared
    /// fatally failed.
    #[arg(long, env = "COORD_CRASH_RETRIES", default_value_t = 3)]
    crash_retries: u32,

    /// Disable the RPC listener and just run the workload to completion —
    /// useful for scripted/non-interactive demo runs.
    #[arg(long)]
    no_serve: bool,

    /// Disable logging entirely.
    #[arg(long)]
    log_off: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.log_off {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
            .init();
    }

    let app_event: serde_json::Value = match serde_json::from_str(&cli.app_event) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("invalid --app-event JSON: {e}");
            return ExitCode::FAILURE;
        }
    };

    let handler = match cli.demo {
        Demo::Factorial => demo::factorial_handler(),
        Demo::Echo => demo::echo_handler(),
    };
    let substrate = Arc::new(LocalSubstrate::new(handler));

    let config = WorkloadConfig {
        rpc_timeout: Duration::from_millis(cli.rpc_timeout_ms),
        invocation_timeout: Duration::from_secs(cli.invocation_timeout_secs),
        crash_retries: cli.crash_retries,
        rpc_bind_addr: cli.rpc_bind_addr.clone(),
    };
    let workload = Workload::new(substrate, config);

    let server_handle = if cli.no_serve {
        None
    } else {
        let app = build_router(workload.clone());
        let listener = match TcpListener::bind(&cli.rpc_bind_addr).await {
            Ok(l) => l,
            Err(e) => {
                eprintln!("failed to bind {}: {e}", cli.rpc_bind_addr);
                return ExitCode::FAILURE;
            }
        };
        tracing::info!("coordinator RPC endpoint listening on {}", cli.rpc_bind_addr);
        Some(tokio::spawn(
            async move { axum::serve(listener, app).await },
        ))
    };

    let outcome = workload.run(app_event).await;
    workload.substrate.finalize().await;
    if let Some(handle) = server_handle {
        handle.abort();
    }

    match outcome {
        WorkloadOutcome::Completed(result) => {
            println!("{result}");
            ExitCode::SUCCESS
        }
        WorkloadOutcome::Fatal(message) => {
            eprintln!("workload failed: {message}");
            ExitCode::FAILURE
        }
    }
}
