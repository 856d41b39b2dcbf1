pub mod args;
pub mod local;
pub mod op;
pub mod ops;

pub use ops::{Account, Daemon, Document, Health, Init, Name, PubSub, Version};
