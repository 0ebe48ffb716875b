use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use scraper::Html;
use tracing::{info, warn};

use crate::cache::CacheStore;

const USER_AGENT: &str = concat!("petition_harvester/", env!("CARGO_PKG_VERSION"));

/// Network side of a fetch. `Ok(None)` means the server answered but not with a
/// usable page (redirect or non-200). `Err` is an I/O level failure.
pub trait Transport {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        (**self).get(url)
    }
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("GET {} failed", url))?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!("Rejected {} for {}", status, url);
            return Ok(None);
        }

        let body = response
            .bytes()
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(Some(body.to_vec()))
    }
}

/// Resolves URLs to parsed documents, cache first.
pub struct PageFetcher<T: Transport> {
    transport: T,
    cache: CacheStore,
}

impl<T: Transport> PageFetcher<T> {
    pub fn new(transport: T, cache: CacheStore) -> Self {
        Self { transport, cache }
    }

    #[cfg(test)]
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Raw page bytes, from cache or network. Network results are cached before returning.
    pub fn fetch_bytes(&self, url: &str) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.cache.load(url)? {
            return Ok(Some(bytes));
        }

        info!("Downloading {}", url);
        let Some(bytes) = self.transport.get(url)? else {
            return Ok(None);
        };
        self.cache.save(url, &bytes)?;
        Ok(Some(bytes))
    }

    pub fn fetch(&self, url: &str) -> Result<Option<Html>> {
        Ok(self
            .fetch_bytes(url)?
            .map(|bytes| Html::parse_document(&String::from_utf8_lossy(&bytes))))
    }
}
