// 🔎 Query/Projection Layer
// Pure filter over the Normalized Store; no business logic

use crate::store::{NormalizedStore, Record};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// SELECTION
// ============================================================================

/// Selection - Which slice of the store a caller wants.
///
/// All filters optional; `None` means "everything". Builder-style, the way
/// downstream report code composes them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    pub entities: Option<BTreeSet<String>>,
    pub metrics: Option<BTreeSet<String>>,
    pub year_range: Option<(i32, i32)>,
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_metrics<I, S>(mut self, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metrics = Some(metrics.into_iter().map(Into::into).collect());
        self
    }

    /// Inclusive on both ends.
    pub fn with_year_range(mut self, from: i32, to: i32) -> Self {
        self.year_range = Some((from, to));
        self
    }

    fn matches(&self, record: &Record) -> bool {
        if let Some(entities) = &self.entities {
            if !entities.contains(&record.entity) {
                return false;
            }
        }
        if let Some(metrics) = &self.metrics {
            if !metrics.contains(&record.metric) {
                return false;
            }
        }
        if let Some((from, to)) = self.year_range {
            if record.year < from || record.year > to {
                return false;
            }
        }
        true
    }

    /// Materialize the selection as a read-only projection.
    pub fn select(&self, store: &NormalizedStore) -> Projection {
        Projection {
            records: store
                .records()
                .iter()
                .filter(|r| self.matches(r))
                .cloned()
                .collect(),
        }
    }
}

// ============================================================================
// PROJECTION
// ============================================================================

/// Projection - A filtered, owned slice of records.
///
/// This is what feeds both the analytics transforms and (externally) the
/// rendering layer. It never references the store it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    records: Vec<Record>,
}

impl Projection {
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entity → value for one (metric, year), non-absent values only.
    /// This is the projection shape the transforms consume.
    pub fn values_for(&self, metric: &str, year: i32) -> BTreeMap<String, f64> {
        self.records
            .iter()
            .filter(|r| r.metric == metric && r.year == year)
            .filter_map(|r| r.value.map(|v| (r.entity.clone(), v)))
            .collect()
    }

    pub fn entities(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.entity.clone()).collect()
    }

    pub fn years(&self) -> BTreeSet<i32> {
        self.records.iter().map(|r| r.year).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
