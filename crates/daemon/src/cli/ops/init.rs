use clap::Args;
use url::Url;

use cairn_daemon::state::{AppConfig, AppState, StateError};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Port the naming server listens on
    #[arg(long)]
    pub naming_port: Option<u16>,

    /// Naming server the client talks to
    #[arg(long)]
    pub naming_url: Option<Url>,

    /// Cloud project owning the pub/sub topics
    #[arg(long)]
    pub pubsub_project: Option<String>,

    /// IPFS HTTP API used to store documents
    #[arg(long)]
    pub ipfs_api_url: Option<Url>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("state error: {0}")]
    State(#[from] StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut config = AppConfig::default();
        if let Some(port) = self.naming_port {
            config.naming_port = port;
        }
        if let Some(url) = &self.naming_url {
            config.naming_url = url.clone();
        }
        if let Some(project) = &self.pubsub_project {
            config.pubsub.project = project.clone();
        }
        if let Some(url) = &self.ipfs_api_url {
            config.ipfs.api_url = url.clone();
        }

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        Ok(format!(
            "initialized {}\n  config: {}\n  names:  {}\n  local:  {}",
            state.cairn_dir.display(),
            state.config_path.display(),
            state.names_path.display(),
            state.local_path.display()
        ))
    }
}
