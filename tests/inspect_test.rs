//! Tests for single tile size breakdowns

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{tile, MockFetcher, WATER_TILE};
use scoville::application::services::{
    breakdown, InspectService, TreemapOptions, TreemapService, NO_KIND,
};
use scoville::application::ApplicationError;
use scoville::domain::TreeNode;
use scoville::infrastructure::traits::RealFileSystem;
use tempfile::TempDir;

fn service(fetcher: MockFetcher) -> InspectService {
    InspectService::new(Arc::new(fetcher), Arc::new(RealFileSystem))
}

#[test]
fn given_water_tile_when_breaking_down_then_accounts_every_byte() {
    // Act
    let sizes = breakdown(WATER_TILE, None).unwrap();

    // Assert
    assert_eq!(sizes.metric("water.properties.size"), Some(24));
    assert_eq!(sizes.metric("water.properties.keys.count"), Some(2));
    assert_eq!(sizes.metric("water.properties.values.count"), Some(2));
    assert_eq!(sizes.metric("water.features"), Some(22));
    assert_eq!(sizes.metric("water.metadata"), Some(14));
    assert_eq!(24 + 22 + 14, 60, "layer size is fully attributed");
}

#[test]
fn given_water_tile_when_flattening_then_labels_are_dotted_paths() {
    let sizes = breakdown(WATER_TILE, None).unwrap();

    let lines: Vec<String> = sizes
        .flatten()
        .into_iter()
        .map(|(label, value)| format!("{label} => {value}"))
        .collect();

    assert_eq!(
        lines,
        vec![
            "water.features => 22",
            "water.metadata => 14",
            "water.properties.keys.count => 2",
            "water.properties.size => 24",
            "water.properties.values.count => 2",
        ]
    );
}

#[test]
fn given_kind_when_breaking_down_then_groups_features_by_value() {
    // Act: "foo" is "bar" on the only feature
    let sizes = breakdown(WATER_TILE, Some("foo")).unwrap();

    // Assert
    assert_eq!(sizes.metric("water.features.bar.count"), Some(1));
    assert_eq!(sizes.metric("water.features.bar.properties"), Some(6));
    assert_eq!(sizes.metric("water.features.bar.geom_cmds"), Some(12));
    assert_eq!(sizes.metric("water.features.bar.metadata"), Some(4));
    assert_eq!(sizes.metric("water.features.bar.names.count"), Some(0));
}

#[test]
fn given_missing_kind_when_breaking_down_then_groups_under_none() {
    let sizes = breakdown(WATER_TILE, Some("kind")).unwrap();

    assert_eq!(sizes.metric(&format!("water.features.{NO_KIND}.count")), Some(1));
}

#[test]
fn given_breakdown_when_converting_to_treemap_then_skips_counts() {
    let sizes = breakdown(WATER_TILE, None).unwrap();

    let doc = sizes.to_treemap("tile.mvt").unwrap();

    assert_eq!(doc.value(), 60.0);
    let json = doc.to_json();
    assert!(!json.contains("count"), "counts are not sizes: {json}");
}

#[rstest]
#[case::empty_tile(Vec::new(), 0.0)]
#[case::water_tile(WATER_TILE.to_vec(), 60.0)]
fn given_breakdown_when_emitting_d3_json_then_treemap_accepts_it(
    #[case] bytes: Vec<u8>,
    #[case] total: f64,
) {
    // Arrange
    let json = breakdown(&bytes, None)
        .unwrap()
        .treemap_document("tile.mvt")
        .to_json();
    let fetcher = MockFetcher::new().with("http://docs.test/tile.json", json.clone());

    // Act
    let doc = TreeNode::from_json(json.as_bytes()).unwrap();
    let svg = TreemapService::new(Arc::new(fetcher), Arc::new(RealFileSystem))
        .render("http://docs.test/tile.json", TreemapOptions::default())
        .unwrap();

    // Assert
    assert_eq!(doc.value(), total);
    assert!(svg.starts_with("<svg"));
}

#[test]
fn given_tile_file_when_inspecting_then_reads_from_disk() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("0.mvt");
    std::fs::write(&path, tile(&[("roads", 10)])).unwrap();
    let fetcher = MockFetcher::new();

    // Act
    let sizes = service(fetcher).inspect(path.to_str().unwrap(), None).unwrap();

    // Assert
    assert_eq!(sizes.metric("roads.features"), Some(14));
}

#[test]
fn given_tile_url_when_inspecting_then_fetches_it() {
    let fetcher = MockFetcher::new().with("http://tiles.test/0/0/0.pbf", WATER_TILE.to_vec());

    let sizes = service(fetcher).inspect("http://tiles.test/0/0/0.pbf", None).unwrap();

    assert_eq!(sizes.metric("water.metadata"), Some(14));
}

#[test]
fn given_missing_tile_when_inspecting_then_reports_status() {
    let fetcher = MockFetcher::new().with_status("http://tiles.test/9/0/0.pbf", 404);

    let result = service(fetcher).inspect("http://tiles.test/9/0/0.pbf", None);

    assert!(matches!(result, Err(ApplicationError::Fetch { status: 404, .. })));
}

#[test]
fn given_truncated_tile_when_inspecting_then_is_a_decode_error() {
    let fetcher = MockFetcher::new().with("http://tiles.test/0/0/0.pbf", WATER_TILE[..20].to_vec());

    let result = service(fetcher).inspect("http://tiles.test/0/0/0.pbf", None);

    assert!(matches!(result, Err(ApplicationError::Domain(_))));
}
