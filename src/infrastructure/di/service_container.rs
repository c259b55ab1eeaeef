//! Service container for dependency injection
//!
//! Wires up all services with their dependencies.

use std::sync::Arc;

use crate::application::services::{
    HeatmapTiles, InspectService, StatsService, TreemapService, TreemapTiles,
};
use crate::config::Settings;
use crate::domain::UrlPattern;
use crate::infrastructure::error::InfraResult;
use crate::infrastructure::fetch::{CachingFetcher, HttpFetcher};
use crate::infrastructure::traits::{Fetcher, FileSystem, RealFileSystem};

/// Container holding the I/O boundaries every service is built from.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Source of tiles and documents, possibly cached
    pub fetcher: Arc<dyn Fetcher>,
}

impl ServiceContainer {
    /// Create a new service container with real implementations.
    pub fn new(settings: Settings) -> InfraResult<Self> {
        let fetcher = HttpFetcher::new(&settings.user_agent, settings.timeout())?;
        Ok(Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(fetcher),
        ))
    }

    /// Create a service container with custom dependencies (for testing).
    pub fn with_deps(settings: Settings, fs: Arc<dyn FileSystem>, fetcher: Arc<dyn Fetcher>) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            fetcher,
        }
    }

    /// Put the on-disk tile cache in front of the fetcher.
    pub fn with_cache(mut self) -> Self {
        self.fetcher = Arc::new(CachingFetcher::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.fs),
            self.settings.cache_dir.clone(),
        ));
        self
    }

    pub fn treemap_service(&self) -> TreemapService {
        TreemapService::new(Arc::clone(&self.fetcher), Arc::clone(&self.fs))
    }

    pub fn inspect_service(&self) -> InspectService {
        InspectService::new(Arc::clone(&self.fetcher), Arc::clone(&self.fs))
    }

    pub fn stats_service(&self, jobs: usize) -> StatsService {
        StatsService::new(Arc::clone(&self.fetcher), jobs)
    }

    pub fn treemap_tiles(&self, pattern: UrlPattern) -> TreemapTiles {
        TreemapTiles::new(Arc::clone(&self.fetcher), pattern)
    }

    /// Heatmap renderer using the configured sampling depth.
    pub fn heatmap_tiles(&self, pattern: UrlPattern) -> HeatmapTiles {
        HeatmapTiles::new(
            Arc::clone(&self.fetcher),
            pattern,
            self.settings.heatmap.sub_zooms,
            self.settings.heatmap.max_zoom,
        )
    }
}
