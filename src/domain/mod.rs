//! Domain layer: tile decoding, size breakdowns and layouts
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod colour;
pub mod coord;
pub mod error;
pub mod mapview;
pub mod mvt;
pub mod pbf;
pub mod sizes;
pub mod treemap;

pub use coord::{parse_tile_list, TileCoord, TileJob, UrlPattern};
pub use error::DomainError;
pub use mapview::MapView;
pub use sizes::{SizeEntry, SizeTree};
pub use treemap::{layout, squarify, Cell, Rect, TreeNode};
