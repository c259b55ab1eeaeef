//! Fetcher implementations: HTTP and an on-disk cache in front of it

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, trace, warn};

use crate::application::hash::cache_path;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::traits::{FetchResponse, Fetcher, FileSystem};

/// Blocking HTTP fetcher. Gzip bodies are decoded transparently.
///
/// Must be used from a thread that may block, never directly on an async
/// executor.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> InfraResult<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> io::Result<FetchResponse> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().map_err(io::Error::other)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(io::Error::other)?.to_vec();
        trace!("GET {} -> {} ({} bytes)", url, status, body.len());
        Ok(FetchResponse { status, body })
    }
}

/// Serves successful responses from disk, fetching and storing on a miss.
///
/// Non-200 responses pass through uncached. Entries are renamed into place
/// once complete, so concurrent workers never read a partial body. A cache
/// entry that cannot be written is logged and the response is still returned.
pub struct CachingFetcher {
    inner: Arc<dyn Fetcher>,
    fs: Arc<dyn FileSystem>,
    cache_dir: PathBuf,
}

impl CachingFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, fs: Arc<dyn FileSystem>, cache_dir: PathBuf) -> Self {
        Self {
            inner,
            fs,
            cache_dir,
        }
    }
}

impl Fetcher for CachingFetcher {
    fn fetch(&self, url: &str) -> io::Result<FetchResponse> {
        let path = cache_path(&self.cache_dir, url);
        if self.fs.is_file(&path) {
            trace!("cache hit {} -> {}", url, path.display());
            return self.fs.read(&path).map(FetchResponse::ok);
        }

        let response = self.inner.fetch(url)?;
        if response.is_ok() {
            let stored = self
                .fs
                .ensure_parent(&path)
                .and_then(|_| self.fs.write_atomic(&path, &response.body));
            if let Err(e) = stored {
                warn!("could not cache {} at {}: {}", url, path.display(), e);
            }
        }
        Ok(response)
    }
}
