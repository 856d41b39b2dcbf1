pub mod client;
pub mod names;
