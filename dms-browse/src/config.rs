use std::fmt;

use anyhow::Context;
use dms_view::ViewConfig;

const DEFAULT_API_URL: &str = "http://localhost:8081";

#[derive(Clone)]
pub struct BrowseConfig {
    pub api_url: String,
    pub token: String,
    pub view: ViewConfig,
}

impl BrowseConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), ViewConfig::from_env())
    }

    fn from_lookup<F>(lookup: F, view: ViewConfig) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let api_url = non_empty("DMS_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let token = non_empty("DMS_TOKEN").context("DMS_TOKEN is not set")?;
        Ok(Self {
            api_url,
            token,
            view,
        })
    }
}

impl fmt::Debug for BrowseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowseConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("view", &self.view)
            .finish()
    }
}
