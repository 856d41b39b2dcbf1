use clap::Args;

use common::crypto::PublicKey;
use common::pubsub::PubSubError;

use super::parse_public_key;
use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Publish {
    pub topic: String,

    pub message: String,

    /// Recipient public key (hex SEC1); repeat for several recipients.
    /// Without any the message is sent in the clear.
    #[arg(long = "to", value_parser = parse_public_key)]
    pub recipients: Vec<PublicKey>,

    /// Bearer token for the pub/sub backend
    #[arg(long, env = "CAIRN_PUBSUB_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("pubsub: {0}")]
    PubSub(#[from] PubSubError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Publish {
    type Error = PublishError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = Local::open(ctx.config_path.clone(), None).await?;
        let bus = local.bus(&self.token);
        bus.publish_message(&self.message, &self.topic, &self.recipients)
            .await?;

        Ok(match self.recipients.len() {
            0 => format!("published plaintext message to {}", self.topic),
            n => format!(
                "published message for {} recipient(s) to {}",
                n, self.topic
            ),
        })
    }
}
