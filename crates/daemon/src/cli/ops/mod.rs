pub mod account;
pub mod daemon;
pub mod document;
pub mod health;
pub mod init;
pub mod name;
pub mod pubsub;
pub mod version;

pub use account::Account;
pub use daemon::Daemon;
pub use document::Document;
pub use health::Health;
pub use init::Init;
pub use name::Name;
pub use pubsub::PubSub;
pub use version::Version;
