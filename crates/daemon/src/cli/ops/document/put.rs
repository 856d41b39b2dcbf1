use std::path::PathBuf;

use clap::Args;

use common::content::{upload_document, DocumentError};
use common::crypto::PublicKey;

use crate::cli::local::{Local, LocalError};
use crate::cli::ops::pubsub::parse_public_key;

#[derive(Args, Debug, Clone)]
pub struct Put {
    /// JSON file to store
    pub file: PathBuf,

    /// Recipient public key (hex SEC1); repeat for several recipients.
    /// Without any the document is stored in the clear.
    #[arg(long = "to", value_parser = parse_public_key)]
    pub recipients: Vec<PublicKey>,
}

#[derive(Debug, thiserror::Error)]
pub enum PutError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("{0} is not json: {1}")]
    Json(PathBuf, serde_json::Error),
    #[error(transparent)]
    Document(#[from] DocumentError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Put {
    type Error = PutError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = Local::open(ctx.config_path.clone(), None).await?;
        let raw = tokio::fs::read(&self.file)
            .await
            .map_err(|e| PutError::Read(self.file.clone(), e))?;
        let document: serde_json::Value =
            serde_json::from_slice(&raw).map_err(|e| PutError::Json(self.file.clone(), e))?;

        let store = local.state.config.ipfs.store();
        let hash = upload_document(&store, &document, &self.recipients).await?;
        Ok(hash.to_string())
    }
}
