use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// In-flight requests get this long to drain after SIGTERM
const SIGTERM_DRAIN_PERIOD: Duration = Duration::from_secs(10);

/// Spawn a task that turns SIGINT (immediately) or SIGTERM (after a drain
/// period) into a send on a shutdown watch channel.
///
/// Returns the task, a sender for shutting down programmatically, and a
/// receiver to hand to services. A programmatic shutdown also ends the task.
pub fn graceful_shutdown_blocker() -> (JoinHandle<()>, watch::Sender<()>, watch::Receiver<()>) {
    let (tx, rx) = watch::channel(());
    let signal_tx = tx.clone();
    let mut requested = rx.clone();

    let handle = tokio::spawn(async move {
        let handlers = signal(SignalKind::interrupt())
            .and_then(|sigint| Ok((sigint, signal(SignalKind::terminate())?)));
        let (mut sigint, mut sigterm) = match handlers {
            Ok(handlers) => handlers,
            Err(e) => {
                tracing::error!("cannot install signal handlers: {}", e);
                let _ = requested.changed().await;
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => tracing::debug!("SIGINT: shutting down now"),
            _ = sigterm.recv() => {
                tracing::debug!("SIGTERM: shutting down in {:?}", SIGTERM_DRAIN_PERIOD);
                tokio::time::sleep(SIGTERM_DRAIN_PERIOD).await;
            }
            _ = requested.changed() => return,
        }

        let _ = signal_tx.send(());
    });

    (handle, tx, rx)
}

/// Route panics through `tracing` so they reach the log file too.
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|info| {
        let thread = std::thread::current();
        let thread = thread.name().unwrap_or("<unnamed>");
        match info.location() {
            Some(loc) => tracing::error!(
                message = %info,
                thread,
                panic.file = loc.file(),
                panic.line = loc.line(),
            ),
            None => tracing::error!(message = %info, thread),
        }
    }));
}

pub fn report_build_info() {
    tracing::info!(
        package = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        debug = cfg!(debug_assertions),
        "service starting up"
    );
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_programmatic_shutdown_ends_waiter() {
        let (waiter, tx, rx) = graceful_shutdown_blocker();
        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(rx.has_changed().unwrap());
    }
}
