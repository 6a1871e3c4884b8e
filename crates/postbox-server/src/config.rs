use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Every flag can also be set through its environment variable (or `.env`).
#[derive(Debug, Parser)]
#[command(name = "postbox", version, about = "Authenticated messaging API")]
pub struct Config {
    #[arg(long, env = "POSTBOX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "POSTBOX_PORT", default_value_t = 8001)]
    pub port: u16,

    /// SQLite database file, created on first start.
    #[arg(long, env = "POSTBOX_DB_PATH", default_value = "postbox.db")]
    pub db_path: PathBuf,

    #[arg(long, env = "POSTBOX_REQUEST_TIMEOUT_SECS", default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Create username1/password1 and username2/password2 if missing.
    #[arg(long, env = "POSTBOX_SEED_DEMO_USERS", default_value_t = false)]
    pub seed_demo_users: bool,
}

impl Config {
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["postbox"]).unwrap();
        assert_eq!(config.port, 8001);
        assert_eq!(config.db_path, PathBuf::from("postbox.db"));
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert!(!config.seed_demo_users);
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "postbox",
            "--host",
            "127.0.0.1",
            "--port",
            "9000",
            "--seed-demo-users",
        ])
        .unwrap();
        assert_eq!(config.listen_addr().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert!(config.seed_demo_users);
    }
}
