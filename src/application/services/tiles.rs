//! Raster tiles describing upstream vector tile sizes
//!
//! Two renderers back the proxy: a treemap of layer sizes for the requested
//! tile, and a heatmap of the total sizes of its descendants a few zooms down.

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::application::render::canvas::{rgba, TRANSPARENT};
use crate::application::render::font::text_size;
use crate::application::render::Canvas;
use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::colour::{heatmap_colour, name_hue, Rgb};
use crate::domain::mvt::Tile;
use crate::domain::{squarify, Rect, TileCoord, UrlPattern};
use crate::infrastructure::traits::Fetcher;

/// Edge length of rendered tiles in pixels.
pub const TILE_SIZE: u32 = 256;

/// Deepest zoom delta a heatmap can resolve: one pixel per child.
pub const MAX_SUB_ZOOMS: u8 = 8;

pub const DEFAULT_SUB_ZOOMS: u8 = 3;
pub const DEFAULT_HEATMAP_MAX_ZOOM: u8 = 16;

/// Rendered tile, or the upstream status when the source tile was not served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TileImage {
    Png(Vec<u8>),
    Upstream(u16),
}

pub trait TileRenderer: Send + Sync {
    fn render(&self, coord: TileCoord) -> ApplicationResult<TileImage>;
}

fn encode(canvas: &Canvas) -> ApplicationResult<Vec<u8>> {
    canvas
        .encode_png()
        .map_err(|e| ApplicationError::OperationFailed {
            context: "encode PNG".into(),
            source: Box::new(e),
        })
}

/// Treemap of a tile's layers by size.
pub struct TreemapTiles {
    fetcher: Arc<dyn Fetcher>,
    pattern: UrlPattern,
}

impl TreemapTiles {
    pub fn new(fetcher: Arc<dyn Fetcher>, pattern: UrlPattern) -> Self {
        Self { fetcher, pattern }
    }
}

impl TileRenderer for TreemapTiles {
    fn render(&self, coord: TileCoord) -> ApplicationResult<TileImage> {
        let url = self.pattern.expand(coord);
        debug!("render treemap tile: {} <- {}", coord, url);
        let response = self.fetcher.fetch(&url).with_url_context(&url)?;
        if !response.is_ok() {
            return Ok(TileImage::Upstream(response.status));
        }

        let mut sizes = Tile::new(&response.body)
            .layers()
            .map(|layer| layer.map(|l| (l.size as u64, l.name)))
            .collect::<Result<Vec<_>, _>>()?;
        sizes.sort_by(|a, b| b.cmp(a));

        Ok(TileImage::Png(encode(&draw_treemap(&sizes))?))
    }
}

/// Draw `(size, name)` pairs, largest first, as a squarified treemap.
///
/// Cells are painted smallest first so labels of large cells stay on top.
pub fn draw_treemap(sizes: &[(u64, String)]) -> Canvas {
    let mut canvas = Canvas::new(TILE_SIZE, TILE_SIZE, rgba(Rgb::BLACK));
    let side = f64::from(TILE_SIZE);
    let values: Vec<f64> = sizes.iter().map(|(size, _)| *size as f64).collect();
    let rects = squarify(&values, Rect::new(0.0, 0.0, side, side));

    for ((_, name), rect) in sizes.iter().zip(rects).rev() {
        let hue = name_hue(name);
        canvas.fill_rect(rect, Rgb::from_hsl(hue, 1.0, 0.7));
        canvas.outline_rect(rect, Rgb::from_hsl(hue, 1.0, 0.3));

        let (text_w, text_h) = text_size(name);
        if rect.dx > f64::from(text_w) && rect.dy > f64::from(text_h) {
            let left = rect.x + (rect.dx - f64::from(text_w)) / 2.0;
            let top = rect.y + (rect.dy - f64::from(text_h)) / 2.0;
            canvas.draw_text(left.round() as i64, top.round() as i64, name, Rgb::BLACK);
        }
    }
    canvas
}

/// Heatmap of descendant tile sizes.
pub struct HeatmapTiles {
    fetcher: Arc<dyn Fetcher>,
    pattern: UrlPattern,
    sub_zooms: u8,
    max_zoom: u8,
}

impl HeatmapTiles {
    pub fn new(fetcher: Arc<dyn Fetcher>, pattern: UrlPattern, sub_zooms: u8, max_zoom: u8) -> Self {
        Self {
            fetcher,
            pattern,
            sub_zooms: sub_zooms.min(MAX_SUB_ZOOMS),
            max_zoom: max_zoom.min(TileCoord::MAX_ZOOM),
        }
    }

    /// Zoom sampled for a tile at `z`: `min(z + sub_zooms, max_zoom)`, never
    /// shallower than `z` itself.
    pub fn sample_zoom(&self, z: u8) -> u8 {
        z.saturating_add(self.sub_zooms).min(self.max_zoom).max(z)
    }

    fn child_size(&self, child: TileCoord) -> Option<u64> {
        let url = self.pattern.expand(child);
        match self.fetcher.fetch(&url) {
            Ok(response) if response.is_ok() => Some(response.body.len() as u64),
            Ok(response) => {
                debug!("heatmap child {} returned {}", child, response.status);
                None
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                None
            }
        }
    }
}

impl TileRenderer for HeatmapTiles {
    fn render(&self, coord: TileCoord) -> ApplicationResult<TileImage> {
        let zoom = self.sample_zoom(coord.z);
        let shift = zoom - coord.z;
        let cell = f64::from(TILE_SIZE) / f64::from(1u32 << shift);
        debug!("render heatmap tile: {} sampled at zoom {}", coord, zoom);

        let sizes: Vec<(TileCoord, Option<u64>)> = coord
            .children_at(zoom)
            .into_par_iter()
            .map(|child| (child, self.child_size(child)))
            .collect();

        let mut canvas = Canvas::new(TILE_SIZE, TILE_SIZE, TRANSPARENT);
        let (x0, y0) = (coord.x << shift, coord.y << shift);
        for (child, size) in sizes {
            if let Some(size) = size {
                let rect = Rect::new(
                    f64::from(child.x - x0) * cell,
                    f64::from(child.y - y0) * cell,
                    cell,
                    cell,
                );
                canvas.fill_rect(rect, heatmap_colour(size));
            }
        }
        Ok(TileImage::Png(encode(&canvas)?))
    }
}
