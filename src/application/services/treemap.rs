//! Treemap rendering of hierarchical size documents

use std::sync::Arc;

use tracing::debug;

use crate::application::render::render_svg;
use crate::application::{resource, ApplicationResult};
use crate::domain::{layout, TreeNode};
use crate::infrastructure::traits::{Fetcher, FileSystem};

pub const DEFAULT_SOURCE: &str = "treemap.json";

/// Canvas size and padding between nested cells.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreemapOptions {
    pub width: f64,
    pub height: f64,
    pub padding: f64,
}

impl Default for TreemapOptions {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 500.0,
            padding: 4.0,
        }
    }
}

/// Service for rendering treemap documents to SVG.
pub struct TreemapService {
    fetcher: Arc<dyn Fetcher>,
    fs: Arc<dyn FileSystem>,
}

impl TreemapService {
    pub fn new(fetcher: Arc<dyn Fetcher>, fs: Arc<dyn FileSystem>) -> Self {
        Self { fetcher, fs }
    }

    /// Load the document at `source` (URL or path).
    pub fn load(&self, source: &str) -> ApplicationResult<TreeNode> {
        let data = resource::load(self.fetcher.as_ref(), self.fs.as_ref(), source)?;
        Ok(TreeNode::from_json(&data)?)
    }

    /// Load, lay out and render. Any load failure aborts before layout.
    pub fn render(&self, source: &str, options: TreemapOptions) -> ApplicationResult<String> {
        debug!("render: source={}, options={:?}", source, options);
        let tree = self.load(source)?;
        let cells = layout(&tree, options.width, options.height, options.padding);
        debug!("render: {} cells", cells.len());
        Ok(render_svg(&cells, options.width, options.height))
    }
}
