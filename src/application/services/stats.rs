//! Size statistics over many tiles
//!
//! Tiles are fetched and decoded on a rayon pool. Each worker folds into its
//! own partial aggregate and the partials are merged at the end, so results
//! do not depend on the number of workers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::mvt::Tile;
use crate::domain::{DomainError, TileJob};
use crate::infrastructure::traits::Fetcher;

/// Label of the whole-tile size within a group.
pub const TOTAL_LABEL: &str = "~total";

pub const DEFAULT_PERCENTILES: [f64; 4] = [50.0, 90.0, 99.0, 99.9];

/// Value at percentile `p` of ascending `sorted`: `sorted[min(n-1, floor(n*p/100))]`.
///
/// `None` for an empty slice.
pub fn percentile(sorted: &[u64], p: f64) -> Option<u64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let index = ((n as f64 * p / 100.0).floor() as usize).min(n - 1);
    Some(sorted[index])
}

pub fn validate_percentiles(percentiles: &[f64]) -> Result<(), DomainError> {
    match percentiles.iter().find(|p| !(0.0..=100.0).contains(*p)) {
        Some(p) => Err(DomainError::InvalidPercentile(*p)),
        None => Ok(()),
    }
}

/// Aggregation group: all tiles, or tiles of one zoom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Overall,
    Zoom(u8),
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Overall => f.write_str("overall"),
            GroupKey::Zoom(z) => write!(f, "{z}"),
        }
    }
}

/// Sizes seen per group and label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SizeSamples {
    groups: BTreeMap<GroupKey, BTreeMap<String, Vec<u64>>>,
    pub failed: usize,
}

impl SizeSamples {
    /// Record one tile: its total size and each layer's size, both overall
    /// and under its zoom.
    pub fn record(&mut self, zoom: u8, tile_size: u64, layers: &[(String, u64)]) {
        for key in [GroupKey::Overall, GroupKey::Zoom(zoom)] {
            let group = self.groups.entry(key).or_default();
            group.entry(TOTAL_LABEL.to_string()).or_default().push(tile_size);
            for (name, size) in layers {
                group.entry(name.clone()).or_default().push(*size);
            }
        }
    }

    pub fn merge(mut self, other: SizeSamples) -> SizeSamples {
        for (key, labels) in other.groups {
            let group = self.groups.entry(key).or_default();
            for (label, mut values) in labels {
                group.entry(label).or_default().append(&mut values);
            }
        }
        self.failed += other.failed;
        self
    }

    pub fn into_report(self, percentiles: &[f64]) -> PercentileReport {
        let groups = self
            .groups
            .into_iter()
            .map(|(key, labels)| {
                let rows = labels
                    .into_iter()
                    .map(|(label, mut values)| {
                        values.sort_unstable();
                        let row = percentiles
                            .iter()
                            .filter_map(|p| percentile(&values, *p))
                            .collect();
                        (label, row)
                    })
                    .collect();
                (key, rows)
            })
            .collect();
        PercentileReport {
            percentiles: percentiles.to_vec(),
            groups,
            failed: self.failed,
        }
    }
}

/// Percentile sizes per group, rows in label order.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentileReport {
    pub percentiles: Vec<f64>,
    pub groups: BTreeMap<GroupKey, Vec<(String, Vec<u64>)>>,
    pub failed: usize,
}

/// One of the largest tiles for a layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Outlier {
    pub size: u64,
    pub features_size: u64,
    pub properties_size: u64,
    pub url: String,
}

/// Keeps the largest `num` entries per layer.
///
/// Entries are totally ordered, so which ones are kept does not depend on
/// insertion or merge order.
#[derive(Debug, Clone, PartialEq)]
pub struct LargestN {
    num: usize,
    layers: BTreeMap<String, Vec<Outlier>>,
    pub failed: usize,
}

impl LargestN {
    pub fn new(num: usize) -> Self {
        Self {
            num,
            layers: BTreeMap::new(),
            failed: 0,
        }
    }

    pub fn insert(&mut self, layer: &str, outlier: Outlier) {
        let largest = self.layers.entry(layer.to_string()).or_default();
        largest.push(outlier);
        if largest.len() > self.num {
            largest.sort_unstable_by(|a, b| b.cmp(a));
            largest.truncate(self.num);
        }
    }

    pub fn merge(mut self, other: LargestN) -> LargestN {
        for (layer, outliers) in other.layers {
            for outlier in outliers {
                self.insert(&layer, outlier);
            }
        }
        self.failed += other.failed;
        self
    }

    /// Per layer, kept entries in ascending order.
    pub fn into_report(self) -> OutlierReport {
        let layers = self
            .layers
            .into_iter()
            .filter(|(_, outliers)| !outliers.is_empty())
            .map(|(layer, mut outliers)| {
                outliers.sort_unstable();
                (layer, outliers)
            })
            .collect();
        OutlierReport {
            layers,
            failed: self.failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub layers: BTreeMap<String, Vec<Outlier>>,
    pub failed: usize,
}

/// Service for percentile and outlier statistics across tiles.
pub struct StatsService {
    fetcher: Arc<dyn Fetcher>,
    jobs: usize,
}

impl StatsService {
    pub fn new(fetcher: Arc<dyn Fetcher>, jobs: usize) -> Self {
        Self {
            fetcher,
            jobs: jobs.max(1),
        }
    }

    /// Percentiles of total and per-layer tile sizes, overall and per zoom.
    pub fn percentiles(
        &self,
        tiles: &[TileJob],
        percentiles: &[f64],
    ) -> ApplicationResult<PercentileReport> {
        debug!(
            "percentiles: tiles={}, percentiles={:?}, jobs={}",
            tiles.len(),
            percentiles,
            self.jobs
        );
        validate_percentiles(percentiles)?;

        let samples = self.pool()?.install(|| {
            tiles
                .par_iter()
                .fold(SizeSamples::default, |mut acc, job| {
                    match self.layer_sizes(job) {
                        Some((size, layers)) => acc.record(job.coord.z, size, &layers),
                        None => acc.failed += 1,
                    }
                    acc
                })
                .reduce(SizeSamples::default, SizeSamples::merge)
        });

        debug!("percentiles: {} tiles failed", samples.failed);
        Ok(samples.into_report(percentiles))
    }

    /// The `num` largest tiles for each layer.
    pub fn outliers(&self, tiles: &[TileJob], num: usize) -> ApplicationResult<OutlierReport> {
        debug!(
            "outliers: tiles={}, num={}, jobs={}",
            tiles.len(),
            num,
            self.jobs
        );

        let largest = self.pool()?.install(|| {
            tiles
                .par_iter()
                .fold(
                    || LargestN::new(num),
                    |mut acc, job| {
                        match self.layer_breakdown(job) {
                            Some(layers) => {
                                for (name, outlier) in layers {
                                    acc.insert(&name, outlier);
                                }
                            }
                            None => acc.failed += 1,
                        }
                        acc
                    },
                )
                .reduce(|| LargestN::new(num), LargestN::merge)
        });

        debug!("outliers: {} tiles failed", largest.failed);
        Ok(largest.into_report())
    }

    fn pool(&self) -> ApplicationResult<rayon::ThreadPool> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| ApplicationError::OperationFailed {
                context: format!("start {} worker threads", self.jobs),
                source: Box::new(e),
            })
    }

    /// Fetch a tile body; failures are logged and yield `None`.
    fn fetch(&self, job: &TileJob) -> Option<Vec<u8>> {
        match self.fetcher.fetch(&job.url) {
            Ok(response) if response.is_ok() => Some(response.body),
            Ok(response) => {
                warn!("Got tile response {} for {}", response.status, job.url);
                None
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", job.url, e);
                None
            }
        }
    }

    /// Tile size and `(layer, size)` pairs, or `None` if the tile is unusable.
    fn layer_sizes(&self, job: &TileJob) -> Option<(u64, Vec<(String, u64)>)> {
        let data = self.fetch(job)?;
        match Tile::new(&data).parse_layers() {
            Ok(layers) => Some((
                data.len() as u64,
                layers
                    .into_iter()
                    .map(|l| (l.name, l.size as u64))
                    .collect(),
            )),
            Err(e) => {
                warn!("Failed to decode {}: {}", job.url, e);
                None
            }
        }
    }

    fn layer_breakdown(&self, job: &TileJob) -> Option<Vec<(String, Outlier)>> {
        let data = self.fetch(job)?;
        match Tile::new(&data).parse_layers() {
            Ok(layers) => Some(
                layers
                    .into_iter()
                    .map(|l| {
                        let outlier = Outlier {
                            size: l.size as u64,
                            features_size: l.features_size as u64,
                            properties_size: l.properties_size as u64,
                            url: job.url.clone(),
                        };
                        (l.name, outlier)
                    })
                    .collect(),
            ),
            Err(e) => {
                warn!("Failed to decode {}: {}", job.url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(50.0, 5)]
    #[case(90.0, 9)]
    #[case(99.0, 9)]
    #[case(100.0, 9)]
    #[case(0.0, 0)]
    fn test_percentile_index(#[case] p: f64, #[case] expected: u64) {
        let values: Vec<u64> = (0..10).collect();
        assert_eq!(percentile(&values, p), Some(expected));
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn given_out_of_range_percentile_when_validating_then_errors() {
        assert_eq!(
            validate_percentiles(&[50.0, 100.5]),
            Err(DomainError::InvalidPercentile(100.5))
        );
        assert!(validate_percentiles(&DEFAULT_PERCENTILES).is_ok());
    }

    #[test]
    fn given_samples_when_recording_then_fills_overall_and_zoom() {
        let mut samples = SizeSamples::default();
        samples.record(3, 100, &[("water".into(), 60)]);
        samples.record(4, 300, &[("water".into(), 200)]);
        let report = samples.into_report(&[50.0]);

        let overall = &report.groups[&GroupKey::Overall];
        // "~total" sorts after layer names
        assert_eq!(overall[0], ("water".to_string(), vec![200]));
        assert_eq!(overall[1], (TOTAL_LABEL.to_string(), vec![300]));
        assert_eq!(report.groups[&GroupKey::Zoom(3)][0].1, vec![100]);
    }

    #[test]
    fn given_more_than_n_when_inserting_then_keeps_largest() {
        let mut largest = LargestN::new(2);
        for size in [5, 1, 9, 7] {
            largest.insert(
                "roads",
                Outlier {
                    size,
                    features_size: 0,
                    properties_size: 0,
                    url: format!("u{size}"),
                },
            );
        }
        let report = largest.into_report();
        let sizes: Vec<u64> = report.layers["roads"].iter().map(|o| o.size).collect();
        assert_eq!(sizes, vec![7, 9]);
    }

    #[test]
    fn test_group_key_order_and_display() {
        assert!(GroupKey::Overall < GroupKey::Zoom(0));
        assert_eq!(GroupKey::Overall.to_string(), "overall");
        assert_eq!(GroupKey::Zoom(12).to_string(), "12");
    }
}
