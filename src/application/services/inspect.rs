//! Byte breakdown of a single tile
//!
//! Produces, per layer, how many bytes go to the key/value tables, to
//! features and to everything else. Features can further be segmented by the
//! value of a "kind" property.

use std::sync::Arc;

use tracing::debug;

use crate::application::{resource, ApplicationResult};
use crate::domain::mvt::{Layer, Tile};
use crate::domain::sizes::COUNT_KEY;
use crate::domain::{DomainError, SizeTree};
use crate::infrastructure::traits::{Fetcher, FileSystem};

/// Group for features that do not carry the kind property.
pub const NO_KIND: &str = "(none)";

const NAME_ALTERNATES: [&str; 9] = [
    "int_name",
    "loc_name",
    "nat_name",
    "official_name",
    "old_name",
    "reg_name",
    "short_name",
    "name_left",
    "name_right",
];

/// True if a property key looks like a name.
pub fn is_name(key: &str) -> bool {
    key == "name" || key.starts_with("name:") || NAME_ALTERNATES.contains(&key)
}

/// Service for breaking a tile's size down by layer.
pub struct InspectService {
    fetcher: Arc<dyn Fetcher>,
    fs: Arc<dyn FileSystem>,
}

impl InspectService {
    pub fn new(fetcher: Arc<dyn Fetcher>, fs: Arc<dyn FileSystem>) -> Self {
        Self { fetcher, fs }
    }

    /// Load a tile from a URL or path and break it down.
    pub fn inspect(&self, source: &str, kind: Option<&str>) -> ApplicationResult<SizeTree> {
        debug!("inspect: source={}, kind={:?}", source, kind);
        let data = resource::load(self.fetcher.as_ref(), self.fs.as_ref(), source)?;
        Ok(breakdown(&data, kind)?)
    }
}

/// Size tree keyed by layer name.
///
/// Each layer has `properties.size`, `properties.keys.count`,
/// `properties.values.count` and `metadata`. Without `kind`, `features` is
/// the total feature bytes; with it, `features` holds one group per kind.
pub fn breakdown(data: &[u8], kind: Option<&str>) -> Result<SizeTree, DomainError> {
    let mut sizes = SizeTree::new();
    for layer in Tile::new(data).layers() {
        let layer = layer?;
        let mut layer_sizes = SizeTree::new();

        let properties = layer_sizes.group_mut("properties");
        properties.set("size", layer.properties_size as u64);
        properties
            .group_mut("keys")
            .set(COUNT_KEY, layer.keys.len() as u64);
        properties
            .group_mut("values")
            .set(COUNT_KEY, layer.values.len() as u64);
        layer_sizes.set("metadata", layer.metadata_size() as u64);

        match kind {
            None => layer_sizes.set("features", layer.features_size as u64),
            Some(kind_key) => layer_sizes.insert_group("features", summarise(&layer, kind_key)?),
        }

        sizes.insert_group(layer.name.clone(), layer_sizes);
    }
    Ok(sizes)
}

/// Per-kind feature totals within one layer.
fn summarise(layer: &Layer<'_>, kind_key: &str) -> Result<SizeTree, DomainError> {
    let mut kinds = SizeTree::new();
    for feature in &layer.features {
        let props = layer.properties(feature)?;
        let kind = props
            .get(kind_key)
            .map(|v| v.to_string())
            .unwrap_or_else(|| NO_KIND.to_string());
        let names = props.keys().filter(|k| is_name(k)).count();

        let group = kinds.group_mut(kind);
        group.add(COUNT_KEY, 1);
        group.add("properties", feature.tags_size as u64);
        group.add("geom_cmds", feature.cmds_size as u64);
        group.add("metadata", feature.metadata_size() as u64);
        group.group_mut("names").add(COUNT_KEY, names as u64);
    }
    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("name", true)]
    #[case("name:en", true)]
    #[case("old_name", true)]
    #[case("name_left", true)]
    #[case("names", false)]
    #[case("kind", false)]
    fn test_is_name(#[case] key: &str, #[case] expected: bool) {
        assert_eq!(is_name(key), expected);
    }

    #[test]
    fn given_empty_tile_when_breaking_down_then_is_empty() {
        assert!(breakdown(b"", None).unwrap().is_empty());
    }
}
