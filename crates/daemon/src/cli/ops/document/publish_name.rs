use clap::Args;

use common::content::{ContentError, ContentHash};

use crate::cli::local::{Local, LocalError};

/// Point a permanent IPNS name at a stored document
#[derive(Args, Debug, Clone)]
pub struct PublishName {
    /// Content hash of the document (0x-prefixed hex)
    pub hash: ContentHash,

    /// Name of the IPNS key on the node; created when missing
    #[arg(long, default_value = "self")]
    pub key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishNameError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for PublishName {
    type Error = PublishNameError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = Local::open(ctx.config_path.clone(), None).await?;
        let name = local
            .state
            .config
            .ipfs
            .store()
            .name_publish(&self.key, &self.hash)
            .await?;
        Ok(name.to_string())
    }
}
