//! Tests for treemap layout and SVG rendering of treemap documents

mod common;

use std::sync::Arc;

use proptest::prelude::*;

use common::MockFetcher;
use scoville::application::services::{TreemapOptions, TreemapService};
use scoville::application::ApplicationError;
use scoville::domain::{layout, Rect, TreeNode};
use scoville::infrastructure::traits::RealFileSystem;
use tempfile::TempDir;

const DOC: &str = r#"{
  "name": "tile",
  "children": [
    {"name": "water", "children": [
      {"name": "features", "size": 300},
      {"name": "metadata", "size": 100}
    ]},
    {"name": "roads & paths", "size": 600}
  ]
}"#;

fn service(fetcher: MockFetcher) -> TreemapService {
    TreemapService::new(Arc::new(fetcher), Arc::new(RealFileSystem))
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    let eps = 1e-6;
    a.x + eps < b.x + b.dx && b.x + eps < a.x + a.dx && a.y + eps < b.y + b.dy && b.y + eps < a.y + a.dy
}

#[test]
fn given_document_url_when_rendering_then_labels_leaves_and_fills_branches() {
    // Arrange
    let fetcher = MockFetcher::new().with("http://docs.test/treemap.json", DOC.as_bytes().to_vec());

    // Act
    let svg = service(fetcher)
        .render("http://docs.test/treemap.json", TreemapOptions::default())
        .unwrap();

    // Assert
    assert!(svg.starts_with("<svg"));
    assert!(svg.contains(r#"width="960" height="500""#));
    assert_eq!(svg.matches(r#"<g class="cell""#).count(), 5);
    assert_eq!(svg.matches("<text").count(), 3, "one label per leaf");
    assert!(svg.contains(">roads &amp; paths</text>"));
    assert!(!svg.contains(">water</text>"), "branches carry no label");
    assert_eq!(svg.matches("style=\"fill: #").count(), 2);
}

#[test]
fn given_failing_fetch_when_rendering_then_errors_without_output() {
    let fetcher = MockFetcher::new().with_status("http://docs.test/treemap.json", 500);

    let result = service(fetcher).render("http://docs.test/treemap.json", TreemapOptions::default());

    assert!(matches!(result, Err(ApplicationError::Fetch { status: 500, .. })));
}

#[test]
fn given_document_file_when_loading_then_validates_it() {
    // Arrange
    let temp = TempDir::new().unwrap();
    let good = temp.path().join("treemap.json");
    let bad = temp.path().join("bad.json");
    std::fs::write(&good, DOC).unwrap();
    std::fs::write(&bad, r#"{"name": "a", "children": [{"name": "no size"}]}"#).unwrap();
    let service = service(MockFetcher::new());

    // Act
    let tree = service.load(good.to_str().unwrap()).unwrap();
    let invalid = service.load(bad.to_str().unwrap());

    // Assert
    assert_eq!(tree.value(), 1000.0);
    assert!(matches!(invalid, Err(ApplicationError::Domain(_))));
}

#[test]
fn given_missing_file_when_loading_then_errors() {
    let result = service(MockFetcher::new()).load("/nonexistent/treemap.json");
    assert!(matches!(result, Err(ApplicationError::OperationFailed { .. })));
}

#[test]
fn given_padding_when_laying_out_then_children_stay_inside_parent() {
    let tree = TreeNode::from_json(DOC.as_bytes()).unwrap();

    let cells = layout(&tree, 960.0, 500.0, 4.0);

    let water = cells.iter().find(|c| c.name == "water").unwrap();
    for child in cells.iter().filter(|c| c.depth == 2) {
        assert!(child.rect.x >= water.rect.x + 4.0 - 1e-9);
        assert!(child.rect.y >= water.rect.y + 4.0 - 1e-9);
        assert!(child.rect.x + child.rect.dx <= water.rect.x + water.rect.dx - 4.0 + 1e-9);
        assert!(child.rect.y + child.rect.dy <= water.rect.y + water.rect.dy - 4.0 + 1e-9);
    }
}

proptest! {
    #[test]
    fn leaves_tile_the_canvas_without_overlap(
        sizes in prop::collection::vec(1u32..1000, 1..12),
        width in 50.0f64..1000.0,
        height in 50.0f64..1000.0,
    ) {
        let children = sizes
            .iter()
            .enumerate()
            .map(|(i, s)| TreeNode::leaf(format!("n{i}"), f64::from(*s)))
            .collect();
        let tree = TreeNode::branch("root", children);
        let total: f64 = sizes.iter().map(|s| f64::from(*s)).sum();

        let cells = layout(&tree, width, height, 0.0);
        let leaves: Vec<_> = cells.iter().filter(|c| c.is_leaf).collect();

        prop_assert_eq!(leaves.len(), sizes.len());
        let covered: f64 = leaves.iter().map(|c| c.rect.area()).sum();
        prop_assert!((covered - width * height).abs() < 1e-6 * width * height);
        for leaf in &leaves {
            let expected = leaf.value / total * width * height;
            prop_assert!((leaf.rect.area() - expected).abs() < 1e-6 * width * height);
            prop_assert!(leaf.rect.x >= -1e-9 && leaf.rect.y >= -1e-9);
            prop_assert!(leaf.rect.x + leaf.rect.dx <= width + 1e-6);
            prop_assert!(leaf.rect.y + leaf.rect.dy <= height + 1e-6);
        }
        for (i, a) in leaves.iter().enumerate() {
            for b in &leaves[i + 1..] {
                prop_assert!(!overlaps(&a.rect, &b.rect), "{:?} overlaps {:?}", a.rect, b.rect);
            }
        }
    }
}
