mod cli;

use clap::{Parser, Subcommand};
use cli::{args::Args, op::Op, Account, Daemon, Document, Health, Init, Name, PubSub, Version};

command_enum! {
    (Init, Init),
    (Daemon, Daemon),
    (Account, Account),
    (Name, Name),
    (Document, Document),
    (Pubsub, PubSub),
    (Health, Health),
    (Version, Version),
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let remote = cli::op::resolve_remote(args.remote, args.config_path.clone());

    let ctx = match cli::op::OpContext::new(remote, args.config_path) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: Failed to create API client: {}", e);
            std::process::exit(1);
        }
    };

    let label = args.command.label();
    match args.command.execute(&ctx).await {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error ({}): {}", label.to_lowercase(), e);
            std::process::exit(1);
        }
    }
}
