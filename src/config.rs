use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Seconds a new connection gets to send its `NAME:` line before the
    /// server drops it. Mid-session reads stay untimed.
    pub handshake_timeout_secs: u64,
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = "gomoku-server.json";
        let config_str = std::fs::read_to_string(config_path)?;
        let config: ServerConfig = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|_| Self::default())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 5000,
            handshake_timeout_secs: 10,
        }
    }
}
