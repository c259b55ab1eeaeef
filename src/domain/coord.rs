//! Tile coordinates, URL patterns and tile lists

use std::fmt;
use std::str::FromStr;

use crate::domain::DomainError;

/// Slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Highest zoom whose tile indices fit in `u32`.
    pub const MAX_ZOOM: u8 = 31;

    pub fn new(z: u8, x: u32, y: u32) -> Result<Self, DomainError> {
        if z > Self::MAX_ZOOM {
            return Err(DomainError::InvalidTileCoord(format!(
                "zoom {z} exceeds {}",
                Self::MAX_ZOOM
            )));
        }
        let n = 1u64 << z;
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(DomainError::InvalidTileCoord(format!(
                "{z}/{x}/{y} is outside the {n}x{n} grid"
            )));
        }
        Ok(Self { z, x, y })
    }

    /// Descendants of this tile at `zoom`, row by row.
    ///
    /// Returns only `self` when `zoom` is not deeper than this tile. Zooms
    /// past [`TileCoord::MAX_ZOOM`] are clamped to it.
    pub fn children_at(&self, zoom: u8) -> Vec<TileCoord> {
        let zoom = zoom.min(Self::MAX_ZOOM);
        if zoom <= self.z {
            return vec![*self];
        }
        let shift = zoom - self.z;
        let n = 1u32 << shift;
        let (x0, y0) = (self.x << shift, self.y << shift);
        (0..n)
            .flat_map(|dy| {
                (0..n).map(move |dx| TileCoord {
                    z: zoom,
                    x: x0 + dx,
                    y: y0 + dy,
                })
            })
            .collect()
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = DomainError;

    /// Parse `z/x/y`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(3, '/').collect();
        let [z, x, y] = parts.as_slice() else {
            return Err(DomainError::InvalidTileCoord(format!(
                "expected z/x/y, got {s:?}"
            )));
        };
        let bad = |what: &str| DomainError::InvalidTileCoord(format!("bad {what} in {s:?}"));
        let z = z.trim().parse().map_err(|_| bad("zoom"))?;
        let x = x.trim().parse().map_err(|_| bad("x"))?;
        let y = y.trim().parse().map_err(|_| bad("y"))?;
        TileCoord::new(z, x, y)
    }
}

/// URL template with `{z}`, `{x}` and `{y}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPattern(String);

impl UrlPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self(pattern.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn expand(&self, coord: TileCoord) -> String {
        self.0
            .replace("{z}", &coord.z.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One tile to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileJob {
    pub coord: TileCoord,
    pub url: String,
}

/// Parse a tile list: one `z/x/y` per line, anything after the first
/// whitespace ignored, blank lines skipped.
pub fn parse_tile_list(content: &str, pattern: &UrlPattern) -> Result<Vec<TileJob>, DomainError> {
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| line.split_whitespace().next().map(|zxy| (i + 1, zxy)))
        .map(|(line, zxy)| {
            let coord: TileCoord = zxy.parse().map_err(|e: DomainError| {
                DomainError::InvalidTileList {
                    line,
                    message: e.to_string(),
                }
            })?;
            Ok(TileJob {
                coord,
                url: pattern.expand(coord),
            })
        })
        .collect()
}
