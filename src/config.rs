use anyhow::{Context, Result};
use std::path::PathBuf;
use url::Url;

use crate::session::SessionStore;

pub const DEFAULT_API_URL: &str = "http://156.67.111.32:3120";
pub const DEFAULT_WEB_URL: &str = "http://localhost:5173";

/// Client configuration loaded from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: Url,
    pub web_url: Url,
    pub data_dir: Option<PathBuf>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("PORTAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let web_url = lookup("PORTAL_WEB_URL").unwrap_or_else(|| DEFAULT_WEB_URL.to_string());

        Ok(Config {
            api_url: parse_base_url(&api_url).context("PORTAL_API_URL must be a valid URL")?,
            web_url: parse_base_url(&web_url).context("PORTAL_WEB_URL must be a valid URL")?,
            data_dir: lookup("PORTAL_DATA_DIR").filter(|d| !d.is_empty()).map(PathBuf::from),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "portal=info".to_string()),
        })
    }

    pub fn session_store(&self) -> SessionStore {
        match &self.data_dir {
            Some(dir) => SessionStore::at(dir),
            None => SessionStore::open_default(),
        }
    }

    /// Shareable link to the listing page for the given query string.
    pub fn listing_url(&self, query: &str) -> Result<Url> {
        let mut url = self.web_url.join("joblistings")?;
        url.set_query(Some(query).filter(|q| !q.is_empty()));
        Ok(url)
    }
}

/// Parses a base URL, making sure relative joins keep its path.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim()).with_context(|| format!("invalid URL '{}'", raw))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
