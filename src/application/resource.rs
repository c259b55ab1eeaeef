//! Loading a resource that may be a URL or a local path

use std::path::Path;

use tracing::debug;

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::infrastructure::traits::{Fetcher, FileSystem};

/// True for `http://` and `https://` sources.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch `source` if it is a URL, otherwise read it from disk.
///
/// A response other than 200 is an `ApplicationError::Fetch`.
pub fn load(fetcher: &dyn Fetcher, fs: &dyn FileSystem, source: &str) -> ApplicationResult<Vec<u8>> {
    if is_url(source) {
        debug!("load: fetching {}", source);
        let response = fetcher.fetch(source).with_url_context(source)?;
        if !response.is_ok() {
            return Err(ApplicationError::Fetch {
                url: source.to_string(),
                status: response.status,
            });
        }
        Ok(response.body)
    } else {
        debug!("load: reading {}", source);
        let path = Path::new(source);
        fs.read(path).with_path_context("read", path)
    }
}
