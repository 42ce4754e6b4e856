//! Daemon assembly and task coordination.
//!
//! In this mode, the daemon:
//! 1. Loads the environment configuration
//! 2. Builds the sensor gauges shared by the supervisor and the API
//! 3. Binds the scrape endpoint
//! 4. Runs the supervisor and the HTTP server as tracked tasks
//! 5. On a signal or a task failure, requests shutdown and joins every task,
//!    aborting whatever is still running after [`SHUTDOWN_GRACE`]

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use gw_core::config::INVERTER_IP_VAR;
use gw_core::ExporterConfig;
use gw_metrics::SensorGauges;
use gw_supervisor::{Supervisor, SupervisorConfig};

type TaskResult = (&'static str, anyhow::Result<()>);

/// How long tasks get to stop on their own once shutdown is requested.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the exporter until a signal arrives or a subsystem fails.
///
/// Returns the name of the signal that stopped it.
pub async fn run(script: PathBuf) -> anyhow::Result<&'static str> {
    info!("GoodWe exporter starting");

    let config = ExporterConfig::from_env()?.with_script_path(script);
    info!(
        inverter_ip = %config.inverter_ip,
        script = %config.script_path.display(),
        "configuration loaded"
    );

    // ── Shared state ───────────────────────────────────────────

    let gauges = Arc::new(SensorGauges::new()?);

    let supervisor = Supervisor::new(
        SupervisorConfig::new(&config.script_path)
            .env(INVERTER_IP_VAR, config.inverter_ip.to_string()),
        gauges.clone(),
    );

    // ── Bind scrape endpoint ───────────────────────────────────

    info!(port = config.metrics_port, "starting http server");
    let listener = bind_listener(config.metrics_port).await?;

    // ── Start tracked tasks ────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks: JoinSet<TaskResult> = JoinSet::new();

    let supervisor_shutdown = shutdown_rx.clone();
    tasks.spawn(async move {
        let result = supervisor.run(supervisor_shutdown).await;
        ("supervisor", result.map_err(anyhow::Error::from))
    });

    let router = gw_api::build_router(gauges);
    let mut server_shutdown = shutdown_rx;
    tasks.spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        ("http server", result.map_err(anyhow::Error::from))
    });

    // ── Wait for a signal or the first task to finish ──────────

    let outcome = tokio::select! {
        signal = shutdown_signal() => {
            info!(%signal, "shutdown signal received");
            Ok(signal)
        }
        Some(joined) = tasks.join_next() => Err(task_failure(joined)),
    };

    if outcome.is_err() {
        info!("subsystem stopped, shutting down");
    }
    let _ = shutdown_tx.send(true);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while let Some(joined) = tasks.join_next().await {
            log_joined(joined);
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            grace_ms = SHUTDOWN_GRACE.as_millis() as u64,
            remaining = tasks.len(),
            "tasks still running after grace period, aborting"
        );
        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            log_joined(joined);
        }
    }

    info!("GoodWe exporter stopped");
    outcome
}

/// Wildcard address on every interface, IPv6 and (dual-stack) IPv4.
fn listen_addr(port: u16) -> SocketAddr {
    SocketAddr::from((Ipv6Addr::UNSPECIFIED, port))
}

/// Bind the scrape endpoint, falling back to IPv4 only on hosts without IPv6.
async fn bind_listener(port: u16) -> anyhow::Result<TcpListener> {
    let addr = listen_addr(port);
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            warn!(%addr, error = %e, "ipv6 bind failed, falling back to ipv4");
            let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
            TcpListener::bind(addr)
                .await
                .with_context(|| format!("failed to bind {addr}"))
        }
    }
}

fn log_joined(joined: Result<TaskResult, JoinError>) {
    match joined {
        Ok((task, Ok(()))) => debug!(task, "task stopped"),
        Ok((task, Err(e))) => warn!(task, error = %e, "task failed during shutdown"),
        Err(e) if e.is_cancelled() => debug!("task aborted"),
        Err(e) => warn!(error = %e, "task panicked during shutdown"),
    }
}

/// Turn an early task completion into the error that ends the daemon.
fn task_failure(joined: Result<TaskResult, JoinError>) -> anyhow::Error {
    match joined {
        Ok((task, Ok(()))) => anyhow!("{task} stopped unexpectedly"),
        Ok((task, Err(e))) => e.context(format!("{task} failed")),
        Err(e) => anyhow!("task panicked: {e}"),
    }
}

/// Resolves on SIGINT or SIGTERM with the signal's name.
async fn shutdown_signal() -> &'static str {
    debug!("handling SIGINT & SIGTERM signals");

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listens_on_all_interfaces() {
        assert_eq!(listen_addr(2112).to_string(), "[::]:2112");
        assert_eq!(listen_addr(9000).port(), 9000);
    }

    #[tokio::test]
    async fn bound_listener_accepts_ipv4() {
        let listener = bind_listener(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move { listener.accept().await.map(|_| ()) });

        tokio::net::TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
        accept.await.unwrap().unwrap();
    }

    #[test]
    fn clean_exit_is_a_failure() {
        let err = task_failure(Ok(("http server", Ok(()))));
        assert_eq!(err.to_string(), "http server stopped unexpectedly");
    }

    #[test]
    fn task_error_keeps_its_cause() {
        let err = task_failure(Ok(("supervisor", Err(anyhow!("failed to start scripts/gw")))));
        assert_eq!(err.to_string(), "supervisor failed");
        assert_eq!(format!("{err:#}"), "supervisor failed: failed to start scripts/gw");
    }

    #[tokio::test]
    async fn panicked_task_is_reported() {
        let joined = tokio::spawn(async {
            if true {
                panic!("boom");
            }
            ("supervisor", Ok(()))
        })
        .await;
        let err = task_failure(joined);
        assert!(err.to_string().starts_with("task panicked"));
    }
}
