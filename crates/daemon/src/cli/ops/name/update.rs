use clap::Args;

use cairn_daemon::http_server::api::client::ApiError;
use common::crypto::Address;

use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Update {
    /// Name to move
    pub id: String,

    /// New pointer
    pub pointer: String,

    /// EC account that owns the name and signs the change
    #[arg(long)]
    pub account: Address,

    /// Keystore password
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("naming server: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Update {
    type Error = UpdateError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local =
            Local::open_unlocking(ctx.config_path.clone(), self.password.as_deref()).await?;
        let owner = local.account(&self.account).await?;
        Ok(ctx.client.update(&self.id, &self.pointer, &owner).await?)
    }
}
