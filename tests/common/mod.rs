//! Shared fixtures: a minimal MVT encoder and an in-memory fetcher
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use scoville::infrastructure::traits::{FetchResponse, Fetcher};

/// Single layer "water" with one linestring and properties foo=bar, baz=foo.
pub const WATER_TILE: &[u8] = b"\x1a\x3a\x0a\x05\x77\x61\x74\x65\x72\x12\x14\x12\x04\
\x00\x00\x01\x01\x18\x02\x22\x0a\x09\x8d\x01\xac\x3f\
\x12\x00\x01\x00\x02\x1a\x03\x66\x6f\x6f\x1a\x03\x62\
\x61\x7a\x22\x05\x0a\x03\x62\x61\x72\x22\x05\x0a\x03\
\x66\x6f\x6f\x28\x80\x20\x78\x01";

pub fn varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Length-delimited field with the given tag.
pub fn field(tag: u32, payload: &[u8], out: &mut Vec<u8>) {
    varint(u64::from(tag) << 3 | 2, out);
    varint(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

/// A layer with one feature whose geometry is `geom_bytes` command bytes.
pub fn layer(name: &str, geom_bytes: usize) -> Vec<u8> {
    let mut feature = Vec::new();
    field(4, &vec![0x09; geom_bytes], &mut feature);

    let mut layer = Vec::new();
    field(1, name.as_bytes(), &mut layer);
    field(2, &feature, &mut layer);
    layer
}

/// A tile from `(layer name, geometry bytes)` pairs.
pub fn tile(layers: &[(&str, usize)]) -> Vec<u8> {
    let mut tile = Vec::new();
    for (name, geom_bytes) in layers {
        field(3, &layer(name, *geom_bytes), &mut tile);
    }
    tile
}

/// Serves canned responses by URL; anything else is a 404.
#[derive(Default)]
pub struct MockFetcher {
    responses: Mutex<HashMap<String, FetchResponse>>,
    failing: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), FetchResponse::ok(body));
        self
    }

    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), FetchResponse::status(status));
        self
    }

    /// Transport failure for `url`.
    pub fn failing(self, url: &str) -> Self {
        self.failing.lock().unwrap().push(url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for MockFetcher {
    fn fetch(&self, url: &str) -> io::Result<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().iter().any(|u| u == url) {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        }
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::status(404)))
    }
}
