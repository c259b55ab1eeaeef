//! scoville: where do the bytes of a vector tile go?
//!
//! Layers, from the inside out:
//! - `domain`: protobuf and MVT decoding, size trees, treemap layout, map view
//! - `application`: services that fetch tiles and documents and render results
//! - `infrastructure`: HTTP fetching, the tile cache, the proxy server and wiring
//! - `cli`: argument parsing and command handlers

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
