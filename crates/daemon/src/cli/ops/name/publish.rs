use clap::Args;

use cairn_daemon::http_server::api::client::ApiError;
use common::crypto::Address;

use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Publish {
    /// Name to register
    pub id: String,

    /// First pointer, usually a content hash
    pub pointer: String,

    /// EC account that will own the name
    #[arg(long)]
    pub account: Address,

    /// Keystore password
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("naming server: {0}")]
    Api(#[from] ApiError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Publish {
    type Error = PublishError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local =
            Local::open_unlocking(ctx.config_path.clone(), self.password.as_deref()).await?;
        let owner = local.account(&self.account).await?;
        Ok(ctx.client.publish(&self.id, &self.pointer, &owner).await?)
    }
}
