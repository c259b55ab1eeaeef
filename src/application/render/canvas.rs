//! Raster drawing for proxy tiles

use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::application::render::font::{glyph, GLYPH_ADVANCE, GLYPH_WIDTH};
use crate::domain::colour::Rgb;
use crate::domain::Rect;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

pub fn rgba(colour: Rgb) -> Rgba<u8> {
    Rgba([colour.0, colour.1, colour.2, 255])
}

/// RGBA image with rectangle and text primitives.
pub struct Canvas {
    image: RgbaImage,
}

impl Canvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, background),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        *self.image.get_pixel(x, y)
    }

    /// Pixel span `[start, end)` covered by `[from, from + len)`, clipped to `max`.
    fn span(from: f64, len: f64, max: u32) -> (u32, u32) {
        let clip = |v: f64| v.round().clamp(0.0, f64::from(max)) as u32;
        (clip(from), clip(from + len))
    }

    pub fn fill_rect(&mut self, rect: Rect, colour: Rgb) {
        let (x0, x1) = Self::span(rect.x, rect.dx, self.width());
        let (y0, y1) = Self::span(rect.y, rect.dy, self.height());
        let colour = rgba(colour);
        for y in y0..y1 {
            for x in x0..x1 {
                self.image.put_pixel(x, y, colour);
            }
        }
    }

    /// One pixel border along the inside edge of `rect`.
    pub fn outline_rect(&mut self, rect: Rect, colour: Rgb) {
        let (x0, x1) = Self::span(rect.x, rect.dx, self.width());
        let (y0, y1) = Self::span(rect.y, rect.dy, self.height());
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        let colour = rgba(colour);
        for x in x0..x1 {
            self.image.put_pixel(x, y0, colour);
            self.image.put_pixel(x, y1 - 1, colour);
        }
        for y in y0..y1 {
            self.image.put_pixel(x0, y, colour);
            self.image.put_pixel(x1 - 1, y, colour);
        }
    }

    /// Draw `text` with its top left corner at (`x`, `y`). Pixels falling
    /// outside the canvas are dropped.
    pub fn draw_text(&mut self, x: i64, y: i64, text: &str, colour: Rgb) {
        let (width, height) = (i64::from(self.width()), i64::from(self.height()));
        let colour = rgba(colour);
        let mut origin = x;
        for ch in text.chars() {
            for (row, bits) in glyph(ch).iter().enumerate() {
                let py = y + row as i64;
                if py < 0 || py >= height {
                    continue;
                }
                for col in 0..GLYPH_WIDTH {
                    if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        let px = origin + i64::from(col);
                        if (0..width).contains(&px) {
                            self.image.put_pixel(px as u32, py as u32, colour);
                        }
                    }
                }
            }
            origin += i64::from(GLYPH_ADVANCE);
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Cursor::new(Vec::new());
        self.image.write_to(&mut buf, ImageFormat::Png)?;
        Ok(buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_rect_when_filling_then_covers_rounded_span() {
        let mut canvas = Canvas::new(10, 10, TRANSPARENT);
        canvas.fill_rect(Rect::new(2.4, 2.6, 3.0, 2.0), Rgb::WHITE);
        assert_eq!(canvas.pixel(2, 3), rgba(Rgb::WHITE));
        assert_eq!(canvas.pixel(4, 4), rgba(Rgb::WHITE));
        assert_eq!(canvas.pixel(5, 4), TRANSPARENT);
        assert_eq!(canvas.pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn given_rect_when_outlining_then_interior_untouched() {
        let mut canvas = Canvas::new(10, 10, TRANSPARENT);
        canvas.outline_rect(Rect::new(0.0, 0.0, 5.0, 5.0), Rgb::BLACK);
        assert_eq!(canvas.pixel(0, 0), rgba(Rgb::BLACK));
        assert_eq!(canvas.pixel(4, 4), rgba(Rgb::BLACK));
        assert_eq!(canvas.pixel(2, 2), TRANSPARENT);
    }

    #[test]
    fn given_text_off_canvas_when_drawing_then_clips() {
        let mut canvas = Canvas::new(4, 4, TRANSPARENT);
        canvas.draw_text(-3, -3, "roads", Rgb::BLACK);
        canvas.draw_text(100, 100, "roads", Rgb::BLACK);
    }

    #[test]
    fn given_canvas_when_encoding_then_writes_png_signature() {
        let png = Canvas::new(2, 2, TRANSPARENT).encode_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
