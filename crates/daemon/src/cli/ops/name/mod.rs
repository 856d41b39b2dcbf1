use clap::{Args, Subcommand};

pub mod publish;
pub mod resolve;
pub mod update;

use crate::cli::op::Op;

crate::command_enum! {
    (Publish, publish::Publish),
    (Update, update::Update),
    (Resolve, resolve::Resolve),
}

pub type NameCommand = Command;

#[derive(Args, Debug, Clone)]
pub struct Name {
    #[command(subcommand)]
    pub command: NameCommand,
}

#[async_trait::async_trait]
impl Op for Name {
    type Error = OpError;
    type Output = OpOutput;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        self.command.execute(ctx).await
    }
}
