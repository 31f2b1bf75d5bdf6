//! Process configuration, read once at startup and passed down explicitly.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the headless item-store, e.g. `https://store.example.com`.
    pub store_url: String,
    /// Static token for server-side store access, if the store requires one.
    pub store_token: Option<String>,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let store_url =
            std::env::var("ITEM_STORE_URL").context("ITEM_STORE_URL must be set")?;
        let store_token = std::env::var("ITEM_STORE_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8083".to_string())
            .parse()
            .context("PORT must be a number")?;
        Ok(Self {
            store_url,
            store_token,
            port,
        })
    }
}
