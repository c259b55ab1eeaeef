//! Treemap documents and squarified layout
//!
//! Layout follows the squarified algorithm of Bruls, Huizing and van Wijk:
//! siblings are sorted by value (largest first) and packed into rows along
//! the shorter side of the remaining rectangle, keeping aspect ratios close
//! to the golden ratio.

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Target aspect ratio of laid out cells.
pub const GOLDEN_RATIO: f64 = 1.618_033_988_749_895;

/// Node of a treemap document: `{"name": .., "size": .., "children": [..]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn leaf(name: impl Into<String>, size: f64) -> Self {
        Self {
            name: name.into(),
            size: Some(size),
            children: None,
        }
    }

    pub fn branch(name: impl Into<String>, children: Vec<TreeNode>) -> Self {
        Self {
            name: name.into(),
            size: None,
            children: Some(children),
        }
    }

    pub fn children(&self) -> &[TreeNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Parse and validate a JSON document.
    pub fn from_json(data: &[u8]) -> Result<Self, DomainError> {
        let node: TreeNode =
            serde_json::from_slice(data).map_err(|e| DomainError::InvalidTree(e.to_string()))?;
        node.validate()?;
        Ok(node)
    }

    pub fn to_json(&self) -> String {
        // TreeNode holds only strings and finite floats
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Leaves must carry a finite, non-negative size.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.is_leaf() {
            return match self.size {
                Some(s) if s.is_finite() && s >= 0.0 => Ok(()),
                Some(s) => Err(DomainError::InvalidTree(format!(
                    "leaf {:?} has invalid size {s}",
                    self.name
                ))),
                None => Err(DomainError::InvalidTree(format!(
                    "leaf {:?} has no size",
                    self.name
                ))),
            };
        }
        self.children().iter().try_for_each(TreeNode::validate)
    }

    /// Leaf sizes summed over the subtree.
    pub fn value(&self) -> f64 {
        if self.is_leaf() {
            self.size.unwrap_or(0.0)
        } else {
            self.children().iter().map(TreeNode::value).sum()
        }
    }
}

/// Axis aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, dx: f64, dy: f64) -> Self {
        Self { x, y, dx, dy }
    }

    pub fn area(&self) -> f64 {
        self.dx * self.dy
    }

    /// Shrink by `padding` on every side, never below zero size.
    pub fn pad(&self, padding: f64) -> Rect {
        let dx = (self.dx - 2.0 * padding).max(0.0);
        let dy = (self.dy - 2.0 * padding).max(0.0);
        Rect::new(self.x + padding, self.y + padding, dx, dy)
    }
}

/// A node with its computed geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub name: String,
    pub depth: usize,
    pub value: f64,
    pub is_leaf: bool,
    pub rect: Rect,
}

/// Lay out `values` (in the given order) so they tile `rect` with areas
/// proportional to each value.
pub fn squarify(values: &[f64], rect: Rect) -> Vec<Rect> {
    let mut out = vec![Rect::new(rect.x, rect.y, 0.0, 0.0); values.len()];
    let total: f64 = values.iter().sum();
    if values.is_empty() || total <= 0.0 || rect.area() <= 0.0 {
        return out;
    }

    let scale = rect.area() / total;
    let areas: Vec<f64> = values.iter().map(|v| v * scale).collect();

    let mut remaining = rect;
    let mut row: Vec<usize> = Vec::new();
    let mut row_area = 0.0;
    let mut best = f64::INFINITY;
    let mut side = remaining.dx.min(remaining.dy);
    let mut next = 0;

    while next < areas.len() {
        row.push(next);
        row_area += areas[next];
        let score = worst(&row, row_area, &areas, side);
        if score <= best {
            best = score;
            next += 1;
        } else {
            row.pop();
            row_area -= areas[next];
            position(&row, row_area, &areas, side, &mut remaining, false, &mut out);
            side = remaining.dx.min(remaining.dy);
            row.clear();
            row_area = 0.0;
            best = f64::INFINITY;
        }
    }
    if !row.is_empty() {
        position(&row, row_area, &areas, side, &mut remaining, true, &mut out);
    }
    out
}

/// Worst aspect ratio in a row laid along a side of length `side`.
fn worst(row: &[usize], row_area: f64, areas: &[f64], side: f64) -> f64 {
    let (rmin, rmax) = row
        .iter()
        .map(|&i| areas[i])
        .filter(|a| *a > 0.0)
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), a| (lo.min(a), hi.max(a)));
    let s = row_area * row_area;
    let u = side * side;
    if s > 0.0 && rmax > 0.0 {
        (u * rmax * GOLDEN_RATIO / s).max(s / (u * rmin * GOLDEN_RATIO))
    } else {
        f64::INFINITY
    }
}

/// Place a row along the side of length `side` and cut it from `rect`.
/// A flushed row takes everything that is left.
fn position(
    row: &[usize],
    row_area: f64,
    areas: &[f64],
    side: f64,
    rect: &mut Rect,
    flush: bool,
    out: &mut [Rect],
) {
    let Some(&last) = row.last() else {
        return;
    };
    let mut thickness = if side > 0.0 { row_area / side } else { 0.0 };

    if side == rect.dx {
        if flush || thickness > rect.dy {
            thickness = rect.dy;
        }
        let mut x = rect.x;
        for &i in row {
            let dx = if thickness > 0.0 {
                (areas[i] / thickness).min(rect.x + rect.dx - x)
            } else {
                0.0
            };
            out[i] = Rect::new(x, rect.y, dx, thickness);
            x += dx;
        }
        // absorb rounding error in the last cell
        out[last].dx += rect.x + rect.dx - x;
        rect.y += thickness;
        rect.dy -= thickness;
    } else {
        if flush || thickness > rect.dx {
            thickness = rect.dx;
        }
        let mut y = rect.y;
        for &i in row {
            let dy = if thickness > 0.0 {
                (areas[i] / thickness).min(rect.y + rect.dy - y)
            } else {
                0.0
            };
            out[i] = Rect::new(rect.x, y, thickness, dy);
            y += dy;
        }
        out[last].dy += rect.y + rect.dy - y;
        rect.x += thickness;
        rect.dx -= thickness;
    }
}

/// Lay out a whole tree inside `width` x `height`.
///
/// Returns every node in pre-order (parents before their children). Children
/// are placed inside their parent's rectangle shrunk by `padding`.
pub fn layout(root: &TreeNode, width: f64, height: f64, padding: f64) -> Vec<Cell> {
    let mut cells = Vec::new();
    layout_node(root, 0, Rect::new(0.0, 0.0, width, height), padding, &mut cells);
    cells
}

fn layout_node(node: &TreeNode, depth: usize, rect: Rect, padding: f64, cells: &mut Vec<Cell>) {
    let value = node.value();
    cells.push(Cell {
        name: node.name.clone(),
        depth,
        value,
        is_leaf: node.is_leaf(),
        rect,
    });
    if node.is_leaf() {
        return;
    }

    let mut children: Vec<(&TreeNode, f64)> =
        node.children().iter().map(|c| (c, c.value())).collect();
    // stable: equal values keep document order
    children.sort_by(|a, b| b.1.total_cmp(&a.1));

    let values: Vec<f64> = children.iter().map(|(_, v)| *v).collect();
    let rects = squarify(&values, rect.pad(padding));
    for ((child, _), child_rect) in children.into_iter().zip(rects) {
        layout_node(child, depth + 1, child_rect, padding, cells);
    }
}
