use clap::Args;

use cairn_daemon::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = std::convert::Infallible;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut lines = Vec::new();

        // 1. Check config directory
        lines.push("Config:".to_string());
        match AppState::load(ctx.config_path.clone()) {
            Ok(state) => {
                lines.push(format!("  directory:    {}", state.cairn_dir.display()));
                lines.push("  config.toml:  OK".to_string());
                lines.push("  names.json:   OK".to_string());
                lines.push("  local.json:   OK".to_string());
                lines.push(format!("  naming_port:  {}", state.config.naming_port));
                lines.push(format!("  naming_url:   {}", state.config.naming_url));
                lines.push(format!("  ipfs_api_url: {}", state.config.ipfs.api_url));
            }
            Err(e) => {
                lines.push(format!("  error: {}", e));
            }
        }

        // 2. Check the naming server
        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        lines.push(String::new());
        lines.push(format!("Naming server ({}):", base));

        for check in ["livez", "readyz"] {
            let url = format!("{}/_status/{}", base.as_str().trim_end_matches('/'), check);
            let line = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => format!("  {:<7} OK", check),
                Ok(resp) => format!("  {:<7} UNHEALTHY ({})", check, resp.status()),
                Err(_) => format!("  {:<7} NOT REACHABLE", check),
            };
            lines.push(line);
        }

        Ok(lines.join("\n"))
    }
}
