use clap::Args;

use common::content::{ContentError, ContentHash};

use crate::cli::local::{Local, LocalError};

/// Look up the document an IPNS name currently points at
#[derive(Args, Debug, Clone)]
pub struct ResolveName {
    /// IPNS name as returned by `document publish-name`
    pub name: ContentHash,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveNameError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for ResolveName {
    type Error = ResolveNameError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = Local::open(ctx.config_path.clone(), None).await?;
        let target = local.state.config.ipfs.store().name_resolve(&self.name).await?;
        Ok(target.to_string())
    }
}
