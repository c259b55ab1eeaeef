//! Cache keys for fetched tiles
//!
//! Tiles are stored by the SHA-224 of their URL without the query string, so
//! API keys in the query neither leak into file names nor split the cache.
//! A two-level fanout keeps directories small.

use sha2::{Digest, Sha224};
use std::path::{Path, PathBuf};

/// Strip the query string (and anything after it).
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Lowercase hex SHA-224 of the URL without its query.
///
/// # Examples
/// ```
/// use scoville::application::hash::cache_key;
///
/// assert_eq!(cache_key("http://t/0/0/0.mvt?key=a"), cache_key("http://t/0/0/0.mvt"));
/// assert_eq!(cache_key("http://t/0/0/0.mvt").len(), 56);
/// ```
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha224::digest(strip_query(url).as_bytes()))
}

/// Location of a URL's cache entry: `<dir>/<h[0..3]>/<h[3..6]>/<h>`.
pub fn cache_path(cache_dir: &Path, url: &str) -> PathBuf {
    let key = cache_key(url);
    cache_dir.join(&key[0..3]).join(&key[3..6]).join(&key)
}
