// ♻️ Store Cache
// Keyed (descriptor → store) cache with at-most-once concurrent build

use crate::normalizer::{normalize, NormalizeReport, NormalizerConfig};
use crate::registry::MetricRegistry;
use crate::source::{GridSource, SourceDescriptor};
use crate::store::NormalizedStore;
use anyhow::Result;
use log::debug;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// LOADED SOURCE
// ============================================================================

/// LoadedSource - One fully normalized source plus its load diagnostics.
/// Immutable once built; readers share it through `Arc` with no locking.
#[derive(Debug)]
pub struct LoadedSource {
    pub descriptor: SourceDescriptor,
    pub store: NormalizedStore,
    pub report: NormalizeReport,
}

// ============================================================================
// STORE CACHE
// ============================================================================

/// StoreCache - Explicit keyed cache, not an implicit function memo.
///
/// Keyed by (origin, fingerprint): reloading the same content returns the
/// cached store without re-parsing; changed content is a different key and
/// builds fresh. A concurrent second load for the same key awaits the
/// in-flight build instead of duplicating it (per-key `OnceCell`). Failed
/// builds are not cached, so a transient read error does not poison the key.
#[derive(Default)]
pub struct StoreCache {
    cells: Mutex<HashMap<String, Arc<OnceCell<Arc<LoadedSource>>>>>,
}

impl StoreCache {
    pub fn new() -> Self {
        StoreCache::default()
    }

    /// Get the store for a descriptor, building it at most once.
    pub fn get_or_build<F>(
        &self,
        descriptor: &SourceDescriptor,
        build: F,
    ) -> Result<Arc<LoadedSource>>
    where
        F: FnOnce() -> Result<LoadedSource>,
    {
        let cell = {
            let mut cells = self.cells.lock().expect("store cache lock poisoned");
            cells
                .entry(descriptor.cache_key())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if cell.get().is_some() {
            debug!("Store cache hit: {}", descriptor.cache_key());
        }

        let loaded = cell.get_or_try_init(|| build().map(Arc::new))?;
        Ok(loaded.clone())
    }

    /// Fetch, normalize, and cache one source end to end.
    pub fn load(
        &self,
        source: &dyn GridSource,
        registry: &MetricRegistry,
        config: &NormalizerConfig,
    ) -> Result<Arc<LoadedSource>> {
        let descriptor = source.descriptor()?;
        self.get_or_build(&descriptor, || {
            let grid = source.fetch()?;
            let (records, report) = normalize(&grid, registry, config)?;
            Ok(LoadedSource {
                descriptor: descriptor.clone(),
                store: NormalizedStore::from_records(records),
                report,
            })
        })
    }

    /// Number of successfully built entries.
    pub fn built_count(&self) -> usize {
        self.cells
            .lock()
            .expect("store cache lock poisoned")
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }
}

// ============================================================================
// TESTS
// ============================================================================
