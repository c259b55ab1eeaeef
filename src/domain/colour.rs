//! Colours for treemap cells and heatmap tiles

use std::collections::HashMap;
use std::fmt;

use sha2::{Digest, Sha256};

/// Opaque 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Parse `#rrggbb`.
    pub const fn hex(v: u32) -> Rgb {
        Rgb((v >> 16) as u8, (v >> 8) as u8, v as u8)
    }

    /// Convert hue (degrees), saturation and lightness (0..=1).
    pub fn from_hsl(hue: f64, saturation: f64, lightness: f64) -> Rgb {
        let h = hue.rem_euclid(360.0) / 60.0;
        let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
        let x = c * (1.0 - (h % 2.0 - 1.0).abs());
        let (r, g, b) = match h as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = lightness - c / 2.0;
        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb(to_u8(r), to_u8(g), to_u8(b))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Stable hue for a name, offset so hues spread from blue.
pub fn name_hue(name: &str) -> f64 {
    let digest = Sha256::digest(name.as_bytes());
    let n = u16::from_be_bytes([digest[0], digest[1]]);
    f64::from((u32::from(n) + 192) % 360)
}

/// The 20-colour categorical palette (four shades of five hues).
pub const CATEGORY20C: [Rgb; 20] = [
    Rgb::hex(0x3182bd),
    Rgb::hex(0x6baed6),
    Rgb::hex(0x9ecae1),
    Rgb::hex(0xc6dbef),
    Rgb::hex(0xe6550d),
    Rgb::hex(0xfd8d3c),
    Rgb::hex(0xfdae6b),
    Rgb::hex(0xfdd0a2),
    Rgb::hex(0x31a354),
    Rgb::hex(0x74c476),
    Rgb::hex(0xa1d99b),
    Rgb::hex(0xc7e9c0),
    Rgb::hex(0x756bb1),
    Rgb::hex(0x9e9ac8),
    Rgb::hex(0xbcbddc),
    Rgb::hex(0xdadaeb),
    Rgb::hex(0x636363),
    Rgb::hex(0x969696),
    Rgb::hex(0xbdbdbd),
    Rgb::hex(0xd9d9d9),
];

/// Assigns palette colours to keys in first-seen order, cycling when the
/// palette is exhausted.
#[derive(Debug, Clone)]
pub struct OrdinalScale {
    palette: &'static [Rgb],
    assigned: HashMap<String, usize>,
}

impl OrdinalScale {
    pub fn new(palette: &'static [Rgb]) -> Self {
        Self {
            palette,
            assigned: HashMap::new(),
        }
    }

    pub fn category20c() -> Self {
        Self::new(&CATEGORY20C)
    }

    pub fn colour(&mut self, key: &str) -> Rgb {
        let next = self.assigned.len();
        let index = *self.assigned.entry(key.to_string()).or_insert(next);
        self.palette[index % self.palette.len()]
    }
}

/// Upper bounds (KiB, exclusive) and colours of the tile size heatmap.
/// Anything at or above the last bound is black.
pub const HEATMAP_SCALE: [(f64, Rgb); 9] = [
    (6.0, Rgb::hex(0xffffff)),
    (12.0, Rgb::hex(0xfff7ec)),
    (25.0, Rgb::hex(0xfee8c8)),
    (50.0, Rgb::hex(0xfdd49e)),
    (75.0, Rgb::hex(0xfdbb84)),
    (125.0, Rgb::hex(0xfc8d59)),
    (250.0, Rgb::hex(0xef6548)),
    (500.0, Rgb::hex(0xd7301f)),
    (750.0, Rgb::hex(0x990000)),
];

pub fn heatmap_colour(size_bytes: u64) -> Rgb {
    let kib = size_bytes as f64 / 1024.0;
    HEATMAP_SCALE
        .iter()
        .find(|(bound, _)| kib < *bound)
        .map(|(_, colour)| *colour)
        .unwrap_or(Rgb::BLACK)
}
