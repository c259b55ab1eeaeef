//! SVG output for treemap layouts

use std::fmt::{self, Write};

use crate::domain::colour::OrdinalScale;
use crate::domain::Cell;

const STYLE: &str = ".cell rect { fill: none; stroke: #fff; } \
.cell text { font: 10px sans-serif; }";

/// Escape text for use in XML content and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// One `<g class="cell">` per laid out node, in layout order.
///
/// Internal nodes are filled from the category palette keyed by name; leaves
/// carry a centred label.
pub fn render_svg(cells: &[Cell], width: f64, height: f64) -> String {
    let mut svg = String::new();
    // fmt::Write into a String only fails if a Display impl does
    let _ = write_svg(&mut svg, cells, width, height);
    svg
}

fn write_svg(out: &mut String, cells: &[Cell], width: f64, height: f64) -> fmt::Result {
    let mut palette = OrdinalScale::category20c();
    writeln!(
        out,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}">"#
    )?;
    writeln!(out, "<style>{STYLE}</style>")?;
    writeln!(out, r#"<g transform="translate(-.5,-.5)">"#)?;
    for cell in cells {
        write_cell(out, cell, &mut palette)?;
    }
    writeln!(out, "</g>\n</svg>")
}

fn write_cell(out: &mut String, cell: &Cell, palette: &mut OrdinalScale) -> fmt::Result {
    let r = cell.rect;
    write!(
        out,
        r#"<g class="cell" transform="translate({},{})">"#,
        r.x, r.y
    )?;
    if cell.is_leaf {
        write!(
            out,
            r#"<rect width="{}" height="{}"/><text x="{}" y="{}" dy=".35em" text-anchor="middle">{}</text>"#,
            r.dx,
            r.dy,
            r.dx / 2.0,
            r.dy / 2.0,
            escape_xml(&cell.name)
        )?;
    } else {
        write!(
            out,
            r#"<rect width="{}" height="{}" style="fill: {}"/>"#,
            r.dx,
            r.dy,
            palette.colour(&cell.name)
        )?;
    }
    writeln!(out, "</g>")
}
