use clap::Args;

use cairn_daemon::http_server::api::client::ApiError;

#[derive(Args, Debug, Clone)]
pub struct Resolve {
    /// Name to look up
    pub id: String,
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Resolve {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        ctx.client.resolve(&self.id).await
    }
}
