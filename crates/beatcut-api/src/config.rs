//! API configuration.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Root of the storage layout the workers write into
    pub root: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            root: PathBuf::from("storage"),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("BEATCUT_API_HOST").unwrap_or(defaults.host),
            port: std::env::var("BEATCUT_API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            root: std::env::var("BEATCUT_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.root),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
