//! Nested size breakdowns
//!
//! A `SizeTree` maps keys to either a metric or a nested tree. It can be
//! flattened into dotted labels, drawn as a box tree, or converted into a
//! treemap document.

use std::collections::BTreeMap;

use crate::domain::treemap::TreeNode;

/// Key under which counts are stored; counts are not sizes and never
/// become treemap cells.
pub const COUNT_KEY: &str = "count";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeEntry {
    Metric(u64),
    Group(SizeTree),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeTree(BTreeMap<String, SizeEntry>);

impl SizeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&SizeEntry> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SizeEntry)> {
        self.0.iter()
    }

    pub fn set(&mut self, key: impl Into<String>, value: u64) {
        self.0.insert(key.into(), SizeEntry::Metric(value));
    }

    /// Add to a metric, creating it at zero. A group under `key` is replaced.
    pub fn add(&mut self, key: impl Into<String>, value: u64) {
        let entry = self.0.entry(key.into()).or_insert(SizeEntry::Metric(0));
        match entry {
            SizeEntry::Metric(v) => *v += value,
            SizeEntry::Group(_) => *entry = SizeEntry::Metric(value),
        }
    }

    pub fn insert_group(&mut self, key: impl Into<String>, group: SizeTree) {
        self.0.insert(key.into(), SizeEntry::Group(group));
    }

    /// Get the group under `key`, creating an empty one if needed.
    pub fn group_mut(&mut self, key: impl Into<String>) -> &mut SizeTree {
        let entry = self
            .0
            .entry(key.into())
            .or_insert_with(|| SizeEntry::Group(SizeTree::new()));
        if let SizeEntry::Metric(_) = entry {
            *entry = SizeEntry::Group(SizeTree::new());
        }
        match entry {
            SizeEntry::Group(g) => g,
            SizeEntry::Metric(_) => unreachable!("entry was just replaced by a group"),
        }
    }

    /// Look up a metric by dotted path, e.g. `water.properties.size`.
    pub fn metric(&self, path: &str) -> Option<u64> {
        let mut node = self;
        let mut parts = path.split('.').peekable();
        while let Some(part) = parts.next() {
            match (node.0.get(part)?, parts.peek()) {
                (SizeEntry::Metric(v), None) => return Some(*v),
                (SizeEntry::Group(g), Some(_)) => node = g,
                _ => return None,
            }
        }
        None
    }

    /// Depth-first `(dotted.label, value)` pairs in key order.
    pub fn flatten(&self) -> Vec<(String, u64)> {
        let mut out = Vec::new();
        self.flatten_into("", &mut out);
        out
    }

    fn flatten_into(&self, prefix: &str, out: &mut Vec<(String, u64)>) {
        for (key, entry) in &self.0 {
            let label = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{prefix}.{key}")
            };
            match entry {
                SizeEntry::Metric(v) => out.push((label, *v)),
                SizeEntry::Group(g) => g.flatten_into(&label, out),
            }
        }
    }

    pub fn to_termtree(&self, root: &str) -> termtree::Tree<String> {
        let mut tree = termtree::Tree::new(root.to_string());
        for (key, entry) in &self.0 {
            match entry {
                SizeEntry::Metric(v) => tree.push(termtree::Tree::new(format!("{key}: {v}"))),
                SizeEntry::Group(g) => tree.push(g.to_termtree(key)),
            };
        }
        tree
    }

    /// Convert into a treemap document. Counts are skipped and groups that end
    /// up with no cells are dropped; `None` when nothing remains.
    pub fn to_treemap(&self, name: &str) -> Option<TreeNode> {
        let children: Vec<TreeNode> = self
            .0
            .iter()
            .filter_map(|(key, entry)| match entry {
                SizeEntry::Group(g) => g.to_treemap(key),
                SizeEntry::Metric(_) if key == COUNT_KEY => None,
                SizeEntry::Metric(v) => Some(TreeNode::leaf(key.clone(), *v as f64)),
            })
            .collect();

        if children.is_empty() {
            None
        } else {
            Some(TreeNode::branch(name, children))
        }
    }

    /// Treemap document that always loads: with no sizes left, a zero leaf.
    pub fn treemap_document(&self, name: &str) -> TreeNode {
        self.to_treemap(name)
            .unwrap_or_else(|| TreeNode::leaf(name, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SizeTree {
        let mut tree = SizeTree::new();
        let water = tree.group_mut("water");
        water.set("metadata", 14);
        water.set("features", 22);
        let props = water.group_mut("properties");
        props.set("size", 24);
        props.group_mut("keys").set(COUNT_KEY, 2);
        tree
    }

    #[test]
    fn given_nested_tree_when_flattening_then_uses_dotted_labels() {
        let flat = sample().flatten();
        assert_eq!(
            flat,
            vec![
                ("water.features".to_string(), 22),
                ("water.metadata".to_string(), 14),
                ("water.properties.keys.count".to_string(), 2),
                ("water.properties.size".to_string(), 24),
            ]
        );
    }

    #[test]
    fn given_counts_when_converting_to_treemap_then_skips_counts_and_empty_groups() {
        let node = sample().to_treemap("tile.mvt").unwrap();
        assert_eq!(node.name, "tile.mvt");
        let water = &node.children()[0];
        let names: Vec<&str> = water.children().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["features", "metadata", "properties"]);
        let props = &water.children()[2];
        assert_eq!(props.children().len(), 1, "keys group only held a count");
    }

    #[test]
    fn given_only_counts_when_converting_then_returns_none() {
        let mut tree = SizeTree::new();
        tree.set(COUNT_KEY, 3);
        assert!(tree.to_treemap("x").is_none());
    }

    #[test]
    fn given_only_counts_when_building_document_then_returns_valid_zero_leaf() {
        let mut tree = SizeTree::new();
        tree.set(COUNT_KEY, 3);

        let doc = tree.treemap_document("x");

        assert!(doc.is_leaf());
        assert_eq!(doc.value(), 0.0);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn given_dotted_path_when_looking_up_metric_then_descends() {
        let tree = sample();
        assert_eq!(tree.metric("water.properties.size"), Some(24));
        assert_eq!(tree.metric("water.properties"), None);
        assert_eq!(tree.metric("roads.features"), None);
    }

    #[test]
    fn given_repeated_add_then_accumulates() {
        let mut tree = SizeTree::new();
        tree.add("count", 1);
        tree.add("count", 1);
        assert_eq!(tree.metric("count"), Some(2));
    }
}
