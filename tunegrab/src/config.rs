//! Application configuration.

use std::path::PathBuf;

/// Application configuration, loaded from environment variables with
/// sensible defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address.
    pub bind_address: String,
    /// Server port.
    pub port: u16,
    /// Root directory for per-job scratch directories.
    pub data_dir: PathBuf,
    /// Path to the yt-dlp binary.
    pub ytdlp_path: String,
    /// Optional directory for rolling log files; console-only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8750,
            data_dir: PathBuf::from("data/jobs"),
            ytdlp_path: "yt-dlp".to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `TUNEGRAB_BIND_ADDRESS` (e.g. "0.0.0.0")
    /// - `TUNEGRAB_PORT` (e.g. "8750")
    /// - `TUNEGRAB_DATA_DIR` (scratch directory root)
    /// - `YTDLP_PATH` (yt-dlp binary)
    /// - `TUNEGRAB_LOG_DIR` (enables file logging)
    pub fn from_env_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(bind_address) = std::env::var("TUNEGRAB_BIND_ADDRESS")
            && !bind_address.trim().is_empty()
        {
            config.bind_address = bind_address;
        }

        if let Ok(port) = std::env::var("TUNEGRAB_PORT")
            && let Ok(parsed) = port.parse::<u16>()
        {
            config.port = parsed;
        }

        if let Ok(data_dir) = std::env::var("TUNEGRAB_DATA_DIR")
            && !data_dir.trim().is_empty()
        {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(ytdlp_path) = std::env::var("YTDLP_PATH")
            && !ytdlp_path.trim().is_empty()
        {
            config.ytdlp_path = ytdlp_path;
        }

        if let Ok(log_dir) = std::env::var("TUNEGRAB_LOG_DIR")
            && !log_dir.trim().is_empty()
        {
            config.log_dir = Some(PathBuf::from(log_dir));
        }

        config
    }
}
