use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://localhost:8081/api";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: String,
    pub token_path: PathBuf,
    pub page_size: u32,
    pub progress_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            token_path: default_token_path(),
            page_size: DEFAULT_PAGE_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Reads `LACORNS_*` variables, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(base) = non_empty_var("LACORNS_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        if let Some(path) = non_empty_var("LACORNS_TOKEN_PATH") {
            config.token_path = PathBuf::from(path);
        }
        if let Some(size) = non_empty_var("LACORNS_PAGE_SIZE") {
            config.page_size = size
                .parse()
                .with_context(|| format!("LACORNS_PAGE_SIZE is not a number: {size}"))?;
            if config.page_size == 0 {
                anyhow::bail!("LACORNS_PAGE_SIZE must be greater than zero");
            }
        }
        if let Some(secs) = non_empty_var("LACORNS_PROGRESS_INTERVAL_SECS") {
            let secs: u64 = secs.parse().with_context(|| {
                format!("LACORNS_PROGRESS_INTERVAL_SECS is not a number: {secs}")
            })?;
            config.progress_interval = Duration::from_secs(secs.max(1));
        }
        Ok(config)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn default_token_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("siamlacorns")
        .join("token.json")
}
