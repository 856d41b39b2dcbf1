use clap::{Args, Subcommand};

pub mod listen;
pub mod publish;

use common::crypto::{KeyError, PublicKey};

use crate::cli::op::Op;

crate::command_enum! {
    (Publish, publish::Publish),
    (Listen, listen::Listen),
}

pub type PubSubCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct PubSub {
    #[command(subcommand)]
    pub command: PubSubCommand,
}

#[async_trait::async_trait]
impl Op for PubSub {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}

/// clap parser for hex encoded SEC1 public keys
pub(crate) fn parse_public_key(s: &str) -> Result<PublicKey, KeyError> {
    PublicKey::from_hex(s)
}
