//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (Fetcher, FileSystem)
//! but are themselves concrete structs, not traits.

mod inspect;
mod stats;
mod tiles;
mod treemap;

pub use inspect::{breakdown, is_name, InspectService, NO_KIND};
pub use stats::{
    percentile, validate_percentiles, GroupKey, LargestN, Outlier, OutlierReport,
    PercentileReport, SizeSamples, StatsService, DEFAULT_PERCENTILES, TOTAL_LABEL,
};
pub use tiles::{
    draw_treemap, HeatmapTiles, TileImage, TileRenderer, TreemapTiles, DEFAULT_HEATMAP_MAX_ZOOM,
    DEFAULT_SUB_ZOOMS, MAX_SUB_ZOOMS, TILE_SIZE,
};
pub use treemap::{TreemapOptions, TreemapService, DEFAULT_SOURCE};
