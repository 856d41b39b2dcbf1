use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the naming HTTP server
    pub naming_port: u16,
    /// JSON file holding the name table
    pub names_path: PathBuf,

    // logging
    pub log_level: tracing::Level,
    /// Directory for log files (optional, logs to stdout only if not set)
    pub log_dir: Option<PathBuf>,
}
