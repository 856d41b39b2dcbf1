use clap::Args;

use common::crypto::{Address, EcAccount};
use common::keystore::{AccountRole, ExternalAccount, KeyManagerError};

use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Account {
    /// External account to resolve (or create) an EC account for; lists the
    /// keystore when omitted
    pub external: Option<Address>,

    /// The external account is already registered with counterparties, so
    /// never mint a new key for it
    #[arg(long)]
    pub registered: bool,

    /// Keystore password
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("key error: {0}")]
    Keys(#[from] KeyManagerError),
    #[error("no ec account is mapped to registered account {0}")]
    Unmapped(Address),
}

fn describe(account: &EcAccount) -> String {
    format!(
        "{}\n  public key x: {}\n  public key y: {}",
        account.address(),
        account.public().x_hex(),
        account.public().y_hex()
    )
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Account {
    type Error = AccountError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local =
            Local::open_unlocking(ctx.config_path.clone(), self.password.as_deref()).await?;

        let Some(address) = self.external else {
            let wallet = local.keys.wallet().await?;
            if wallet.is_empty() {
                return Ok("keystore is empty".to_string());
            }
            return Ok(wallet
                .accounts()
                .map(describe)
                .collect::<Vec<_>>()
                .join("\n"));
        };

        let external = ExternalAccount {
            address,
            role: if self.registered {
                AccountRole::Registered
            } else {
                AccountRole::Unregistered
            },
        };
        match local.keys.get_or_create_ec_account(&external).await? {
            Some(account) => Ok(describe(&account)),
            None => Err(AccountError::Unmapped(address)),
        }
    }
}
