pub mod utils;

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::http_server;
use crate::{ServiceConfig, ServiceState};

/// How long tasks get to finish after the shutdown signal
const JOIN_DEADLINE: Duration = Duration::from_secs(30);
const LOG_FILE_PREFIX: &str = "cairn.log";

/// Running service tasks plus the means to stop them.
pub struct ShutdownHandle {
    signal_waiter: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<()>,
}

impl ShutdownHandle {
    /// Block until a signal or [`ShutdownHandle::shutdown`] stops the service.
    pub async fn wait(self) {
        let _ = self.signal_waiter.await;

        if tokio::time::timeout(JOIN_DEADLINE, join_all(self.tasks))
            .await
            .is_err()
        {
            tracing::error!(
                "service tasks still running {}s after shutdown",
                JOIN_DEADLINE.as_secs()
            );
            std::process::exit(4);
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

fn level_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber: compact non-blocking stdout, plus a daily
/// rolling file under `log_dir` when one is given. `RUST_LOG` overrides
/// `level` for both.
///
/// The returned guards flush the writers on drop; hold them until exit.
pub fn init_logging(level: tracing::Level, log_dir: Option<&Path>) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(level_filter(level));

    let file_layer = log_dir.and_then(|dir| {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: cannot create log directory {:?}: {}", dir, e);
            return None;
        }
        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        guards.push(file_guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(level_filter(level)),
        )
    });

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .init();

    utils::register_panic_logger();
    utils::report_build_info();

    guards
}

fn spawn_naming_server(
    config: &ServiceConfig,
    state: ServiceState,
    shutdown_rx: watch::Receiver<()>,
) -> JoinHandle<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.naming_port));
    let server_config = http_server::Config::new(addr, config.log_level);
    tokio::spawn(async move {
        if let Err(e) = http_server::run(server_config, state, shutdown_rx).await {
            tracing::error!("naming server error: {}", e);
        }
    })
}

/// Load the name table and spawn the naming server.
///
/// Exits the process with status 3 if the name table cannot be loaded. The
/// returned `ShutdownHandle` must be kept alive; dropping it does not stop
/// the service.
pub async fn start_service(service_config: &ServiceConfig) -> (ServiceState, ShutdownHandle) {
    let (signal_waiter, shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker();

    let state = match ServiceState::from_config(service_config, shutdown_rx.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            std::process::exit(3);
        }
    };

    let tasks = vec![spawn_naming_server(
        service_config,
        state.clone(),
        shutdown_rx,
    )];
    tracing::info!(
        port = service_config.naming_port,
        names = %service_config.names_path.display(),
        "naming server started"
    );

    let handle = ShutdownHandle {
        signal_waiter,
        tasks,
        shutdown_tx,
    };
    (state, handle)
}

/// Run the daemon until a shutdown signal arrives.
pub async fn spawn_service(service_config: &ServiceConfig) {
    let _guards = init_logging(service_config.log_level, service_config.log_dir.as_deref());
    let (_, handle) = start_service(service_config).await;
    handle.wait().await;
}
