use clap::Args;

use cairn_daemon::state::AppState;
use cairn_daemon::{spawn_service, ServiceConfig};

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override naming server port (default from config)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory for log files (defaults to the logs/ directory of the state dir)
    #[arg(long)]
    pub log_dir: Option<std::path::PathBuf>,

    /// Log to stdout only
    #[arg(long, conflicts_with = "log_dir")]
    pub no_log_file: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] cairn_daemon::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let state = AppState::load(ctx.config_path.clone())?;

        let log_dir = if self.no_log_file {
            None
        } else {
            Some(self.log_dir.clone().unwrap_or(state.logs_path.clone()))
        };

        let config = ServiceConfig {
            naming_port: self.port.unwrap_or(state.config.naming_port),
            names_path: state.names_path.clone(),
            log_level: state.config.tracing_level(),
            log_dir,
        };

        spawn_service(&config).await;
        Ok("daemon ended".to_string())
    }
}
