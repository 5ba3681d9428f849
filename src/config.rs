use std::{env, net::SocketAddr};

use tracing::info;

const DB_PATH: &str = "forum.sqlite3";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "4000";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let host = var_or("FORUM_HOST", DEFAULT_HOST);
        let port = var_or("FORUM_PORT", DEFAULT_PORT);
        let port = port
            .parse::<u16>()
            .map_err(|error| format!("invalid FORUM_PORT {port:?}: {error}"))?;
        let db_path = var_or("FORUM_DB_PATH", DB_PATH);
        let api_key = env::var("FORUM_API_KEY")
            .ok()
            .filter(|value| !value.is_empty());

        Ok(Self {
            host,
            port,
            db_path,
            api_key,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| "invalid FORUM_HOST or FORUM_PORT".to_string())
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}
