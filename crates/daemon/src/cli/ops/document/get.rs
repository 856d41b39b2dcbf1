use clap::Args;

use common::content::{download_document, ContentHash, DocumentError};
use common::crypto::{Address, SecretKey};

use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Get {
    /// Content hash (0x-prefixed hex)
    pub hash: ContentHash,

    /// EC account to decrypt with; repeat to try several. The document is
    /// read as plaintext when omitted.
    #[arg(long = "account")]
    pub accounts: Vec<Address>,

    /// Keystore password (needed with --account)
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GetError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("document json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Get {
    type Error = GetError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = if self.accounts.is_empty() {
            Local::open(ctx.config_path.clone(), None).await?
        } else {
            Local::open_unlocking(ctx.config_path.clone(), self.password.as_deref()).await?
        };

        let mut keys: Vec<SecretKey> = Vec::with_capacity(self.accounts.len());
        for address in &self.accounts {
            keys.push(local.account(address).await?.secret().clone());
        }

        let store = local.state.config.ipfs.store();
        let document: serde_json::Value = download_document(&store, &self.hash, &keys).await?;
        Ok(serde_json::to_string_pretty(&document)?)
    }
}
