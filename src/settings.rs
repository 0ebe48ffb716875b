use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::cache::CacheKey;

const CONFIG_FILE: &str = "petitions";
const ENV_PREFIX: &str = "PETITIONS";

pub const DEFAULT_LIST_URL: &str = "https://epetitions.brisbane.qld.gov.au/";
pub const DEFAULT_ITEM_URL: &str = "https://epetitions.brisbane.qld.gov.au/petition/view/pid/{}";
pub const DEFAULT_SIGN_URL: &str = "https://www.epetitions.brisbane.qld.gov.au/petition/sign/pid/{}";

/// Everything a harvest run needs to know, resolved once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub cache_enabled: bool,
    pub cache_dir: PathBuf,
    pub cache_key: CacheKey,
    pub store_path: PathBuf,
    pub list_url: String,
    pub item_url_template: String,
    pub sign_url_template: String,
    pub strict_reconciliation: bool,
    pub skip_failed_items: bool,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_enabled: true,
            cache_dir: PathBuf::from("cache"),
            cache_key: CacheKey::Sha256,
            store_path: PathBuf::from("data.sqlite"),
            list_url: DEFAULT_LIST_URL.to_string(),
            item_url_template: DEFAULT_ITEM_URL.to_string(),
            sign_url_template: DEFAULT_SIGN_URL.to_string(),
            strict_reconciliation: false,
            skip_failed_items: false,
            http_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Defaults, then `petitions.toml` if present, then `PETITIONS_*` env vars.
    pub fn load() -> Result<Self> {
        let d = Settings::default();
        Config::builder()
            .set_default("cache_enabled", d.cache_enabled)?
            .set_default("cache_dir", d.cache_dir.to_string_lossy().to_string())?
            .set_default("cache_key", "sha256")?
            .set_default("store_path", d.store_path.to_string_lossy().to_string())?
            .set_default("list_url", d.list_url)?
            .set_default("item_url_template", d.item_url_template)?
            .set_default("sign_url_template", d.sign_url_template)?
            .set_default("strict_reconciliation", d.strict_reconciliation)?
            .set_default("skip_failed_items", d.skip_failed_items)?
            .set_default("http_timeout_secs", d.http_timeout_secs)?
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }

    pub fn urls(&self) -> UrlTemplates {
        UrlTemplates {
            item: self.item_url_template.clone(),
            sign: self.sign_url_template.clone(),
        }
    }
}

/// Templates with a single `{}` placeholder for the reference id.
#[derive(Debug, Clone)]
pub struct UrlTemplates {
    pub item: String,
    pub sign: String,
}

impl Default for UrlTemplates {
    fn default() -> Self {
        UrlTemplates {
            item: DEFAULT_ITEM_URL.to_string(),
            sign: DEFAULT_SIGN_URL.to_string(),
        }
    }
}

impl UrlTemplates {
    pub fn item_url(&self, reference_id: &str) -> String {
        self.item.replace("{}", reference_id)
    }

    pub fn sign_url(&self, reference_id: &str) -> String {
        self.sign.replace("{}", reference_id)
    }
}
