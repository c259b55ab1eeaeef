//! Tests for percentile and outlier statistics over many tiles

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{tile, MockFetcher};
use scoville::application::services::{GroupKey, StatsService, TOTAL_LABEL};
use scoville::application::ApplicationError;
use scoville::domain::{parse_tile_list, DomainError, TileJob, UrlPattern};
use scoville::util::testing::init_test_setup;

const PATTERN: &str = "http://tiles.test/{z}/{x}/{y}.pbf";

fn jobs(list: &str) -> Vec<TileJob> {
    parse_tile_list(list, &UrlPattern::new(PATTERN)).unwrap()
}

/// Four tiles with a "roads" layer of 23, 33, 43 and 53 bytes; the first
/// two also carry a 17 byte "water" layer.
fn fetcher() -> MockFetcher {
    MockFetcher::new()
        .with("http://tiles.test/0/0/0.pbf", tile(&[("roads", 10), ("water", 4)]))
        .with("http://tiles.test/1/0/0.pbf", tile(&[("roads", 20), ("water", 4)]))
        .with("http://tiles.test/1/1/0.pbf", tile(&[("roads", 30)]))
        .with("http://tiles.test/1/1/1.pbf", tile(&[("roads", 40)]))
}

const TILES: &str = "0/0/0\n1/0/0\n1/1/0\n1/1/1\n";

#[test]
fn given_tiles_when_calculating_percentiles_then_reports_layers_and_total() {
    // Arrange
    init_test_setup();
    let service = StatsService::new(Arc::new(fetcher()), 1);

    // Act
    let report = service.percentiles(&jobs(TILES), &[0.0, 50.0, 100.0]).unwrap();

    // Assert
    let overall = &report.groups[&GroupKey::Overall];
    let labels: Vec<&str> = overall.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["roads", "water", TOTAL_LABEL]);
    assert_eq!(overall[0].1, vec![23, 43, 53]);
    assert_eq!(overall[1].1, vec![17, 17, 17]);
    assert_eq!(overall[2].1, vec![40, 50, 53]);
    assert_eq!(report.failed, 0);
}

#[test]
fn given_tiles_when_calculating_percentiles_then_groups_by_zoom() {
    let service = StatsService::new(Arc::new(fetcher()), 1);

    let report = service.percentiles(&jobs(TILES), &[50.0]).unwrap();

    let keys: Vec<GroupKey> = report.groups.keys().copied().collect();
    assert_eq!(keys, vec![GroupKey::Overall, GroupKey::Zoom(0), GroupKey::Zoom(1)]);
    let zoom1 = &report.groups[&GroupKey::Zoom(1)];
    assert_eq!(zoom1[0], ("roads".to_string(), vec![43]));
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(8)]
fn given_worker_count_when_calculating_then_matches_sequential(#[case] workers: usize) {
    // Arrange
    let many: String = (0..4u32)
        .flat_map(|x| (0..4u32).map(move |y| format!("2/{x}/{y}\n")))
        .collect();
    let mut mock = MockFetcher::new();
    for x in 0..4usize {
        for y in 0..4usize {
            mock = mock.with(
                &format!("http://tiles.test/2/{x}/{y}.pbf"),
                tile(&[("roads", 1 + x * 7 + y * 3), ("water", 1 + y)]),
            );
        }
    }
    let mock = Arc::new(mock);
    let tiles = jobs(&many);

    // Act
    let sequential = StatsService::new(mock.clone(), 1)
        .percentiles(&tiles, &[50.0, 90.0])
        .unwrap();
    let parallel = StatsService::new(mock.clone(), workers)
        .percentiles(&tiles, &[50.0, 90.0])
        .unwrap();
    let outliers_sequential = StatsService::new(mock.clone(), 1).outliers(&tiles, 3).unwrap();
    let outliers_parallel = StatsService::new(mock, workers).outliers(&tiles, 3).unwrap();

    // Assert
    assert_eq!(sequential, parallel);
    assert_eq!(outliers_sequential, outliers_parallel);
}

#[test]
fn given_failing_tiles_when_calculating_then_skips_and_counts_them() {
    // Arrange: one 404, one transport failure, one undecodable body
    let mock = fetcher()
        .with_status("http://tiles.test/1/0/0.pbf", 404)
        .failing("http://tiles.test/1/1/0.pbf")
        .with("http://tiles.test/1/1/1.pbf", b"\x08\x01".to_vec());
    let service = StatsService::new(Arc::new(mock), 2);

    // Act
    let report = service.percentiles(&jobs(TILES), &[50.0]).unwrap();

    // Assert
    assert_eq!(report.failed, 3);
    assert_eq!(report.groups[&GroupKey::Overall][0], ("roads".to_string(), vec![23]));
}

#[test]
fn given_invalid_percentile_when_calculating_then_errors() {
    let service = StatsService::new(Arc::new(fetcher()), 1);

    let result = service.percentiles(&jobs(TILES), &[50.0, 101.0]);

    assert!(matches!(
        result,
        Err(ApplicationError::Domain(DomainError::InvalidPercentile(p))) if p == 101.0
    ));
}

#[test]
fn given_tiles_when_finding_outliers_then_keeps_largest_per_layer_ascending() {
    // Arrange
    let service = StatsService::new(Arc::new(fetcher()), 2);

    // Act
    let report = service.outliers(&jobs(TILES), 2).unwrap();

    // Assert
    let roads: Vec<(u64, &str)> = report.layers["roads"]
        .iter()
        .map(|o| (o.size, o.url.as_str()))
        .collect();
    assert_eq!(
        roads,
        vec![
            (43, "http://tiles.test/1/1/0.pbf"),
            (53, "http://tiles.test/1/1/1.pbf"),
        ]
    );
    let water = &report.layers["water"];
    assert_eq!(water.len(), 2);
    assert_eq!(water[0].features_size, 8);
    assert_eq!(water[0].properties_size, 0);
}
