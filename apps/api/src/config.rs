use anyhow::{Context, Result};

const DEFAULT_COUCHDB_URL: &str = "http://localhost:5984";
const DEFAULT_COUCHDB_USER: &str = "admin";
const DEFAULT_COUCHDB_PASSWORD: &str = "pallybot-admin-password";
const DEFAULT_PORT: &str = "5055";

/// Application configuration loaded from environment variables.
/// Every variable has a default, so a bare environment boots against a local CouchDB.
#[derive(Debug, Clone)]
pub struct Config {
    pub couchdb_url: String,
    pub couchdb_user: String,
    pub couchdb_password: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves the config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            couchdb_url: var_or("COUCHDB_URL", DEFAULT_COUCHDB_URL)
                .trim_end_matches('/')
                .to_string(),
            couchdb_user: var_or("COUCHDB_USER", DEFAULT_COUCHDB_USER),
            couchdb_password: var_or("COUCHDB_PASSWORD", DEFAULT_COUCHDB_PASSWORD),
            port: var_or("PORT", DEFAULT_PORT)
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var_or("RUST_LOG", "info"),
        })
    }
}
