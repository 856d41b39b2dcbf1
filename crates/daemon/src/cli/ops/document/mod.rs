use clap::{Args, Subcommand};

pub mod get;
pub mod publish_name;
pub mod put;
pub mod resolve_name;

use crate::cli::op::Op;

crate::command_enum! {
    (Put, put::Put),
    (Get, get::Get),
    (PublishName, publish_name::PublishName),
    (ResolveName, resolve_name::ResolveName),
}

pub type DocumentCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Document {
    #[command(subcommand)]
    pub command: DocumentCommand,
}

#[async_trait::async_trait]
impl Op for Document {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
