//! Output rendering: SVG treemaps and raster tiles

pub mod canvas;
pub mod font;
pub mod svg;

pub use canvas::Canvas;
pub use svg::render_svg;
