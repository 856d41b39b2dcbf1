use clap::Args;

use cairn_daemon::process::utils::graceful_shutdown_blocker;
use common::crypto::Address;
use common::pubsub::PubSubError;

use crate::cli::local::{Local, LocalError};

#[derive(Args, Debug, Clone)]
pub struct Listen {
    pub topic: String,

    /// EC account whose key is tried on encrypted messages; plaintext only
    /// when omitted
    #[arg(long)]
    pub account: Option<Address>,

    /// Keystore password (needed with --account)
    #[arg(long, env = "CAIRN_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Bearer token for the pub/sub backend
    #[arg(long, env = "CAIRN_PUBSUB_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ListenError {
    #[error(transparent)]
    Local(#[from] LocalError),
    #[error("pubsub: {0}")]
    PubSub(#[from] PubSubError),
    #[error("poll loop ended abnormally: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn print_message(message: &str, topic: &str) -> anyhow::Result<()> {
    println!("[{}] {}", topic, message);
    Ok(())
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Listen {
    type Error = ListenError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let local = match self.account {
            Some(address) => {
                let local =
                    Local::open_unlocking(ctx.config_path.clone(), self.password.as_deref())
                        .await?;
                // fail before subscribing if the key is not ours
                local.account(&address).await?;
                local
            }
            None => Local::open(ctx.config_path.clone(), None).await?,
        };

        let bus = local.bus(&self.token);
        let subscription = bus.subscribe_to_topic(&self.topic, self.account).await?;
        // every restored subscription is polled, so print all of them
        for topic in bus.subscriptions().await?.into_keys() {
            bus.register_topic_processor(topic, print_message);
        }
        eprintln!(
            "listening on {} as {} (ctrl-c to stop)",
            self.topic, subscription.id
        );

        let (signal_waiter, _shutdown_tx, shutdown_rx) = graceful_shutdown_blocker();
        let poller = bus.start(shutdown_rx).await?;
        let _ = signal_waiter.await;
        poller.await?;

        Ok(format!("stopped listening on {}", self.topic))
    }
}
