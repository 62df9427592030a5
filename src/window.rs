// ⏳ Temporal Window Selector
// Picks a (latest_year, base_year) pair with enough cross-entity overlap

use crate::store::NormalizedStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// CONFIG
// ============================================================================

/// WindowConfig - Offset range and overlap threshold, passed in explicitly.
///
/// Later-filed data is sparser, so candidates are tried from the largest
/// offset downward: the longest comparison window that still guarantees a
/// minimum sample size wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    pub offset_max: i32,
    pub offset_min: i32,
    pub overlap_threshold: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            offset_max: 10,
            offset_min: 5,
            overlap_threshold: 30,
        }
    }
}

// ============================================================================
// RESULT / ERRORS
// ============================================================================

/// WindowSelection - Computed on demand, never persisted; it depends on
/// which metric(s) are being compared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSelection {
    pub latest_year: i32,
    pub base_year: i32,
    pub overlap: BTreeSet<String>,
}

/// WindowError - Callers must surface these, never guess a year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// No year carries a non-absent value for every target metric.
    NoData,
    /// No candidate base year met the overlap threshold.
    InsufficientOverlap {
        threshold: usize,
        best_overlap: usize,
    },
}

impl std::fmt::Display for WindowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowError::NoData => write!(f, "No year has data for all target metrics"),
            WindowError::InsufficientOverlap {
                threshold,
                best_overlap,
            } => write!(
                f,
                "No base year reaches the overlap threshold ({} required, best candidate had {})",
                threshold, best_overlap
            ),
        }
    }
}

impl std::error::Error for WindowError {}

// ============================================================================
// SELECTION
// ============================================================================

/// Entities present (non-absent) for a metric in a year, intersected across
/// all target metrics.
fn joint_entities(store: &NormalizedStore, metrics: &[&str], year: i32) -> BTreeSet<String> {
    let mut iter = metrics.iter();
    let first = match iter.next() {
        Some(m) => store.entities_with(m, year),
        None => return BTreeSet::new(),
    };
    iter.fold(first, |acc, m| {
        let next = store.entities_with(m, year);
        acc.intersection(&next).cloned().collect()
    })
}

/// Select a comparison window for one or two (or more) target metrics.
///
/// 1. `latest_year` = max year where every target metric has data.
/// 2. Try offsets from `offset_max` down to `offset_min`.
/// 3. Accept the first candidate whose latest/base entity overlap reaches
///    `overlap_threshold`.
pub fn select_window(
    store: &NormalizedStore,
    metrics: &[&str],
    config: &WindowConfig,
) -> Result<WindowSelection, WindowError> {
    if metrics.is_empty() {
        return Err(WindowError::NoData);
    }

    let mut common_years: Option<BTreeSet<i32>> = None;
    for metric in metrics {
        let years = store.years_for(metric);
        common_years = Some(match common_years {
            None => years,
            Some(acc) => acc.intersection(&years).copied().collect(),
        });
    }
    let latest_year = match common_years.and_then(|y| y.iter().next_back().copied()) {
        Some(y) => y,
        None => return Err(WindowError::NoData),
    };

    let latest_entities = joint_entities(store, metrics, latest_year);
    let mut best_overlap = 0;

    let mut offset = config.offset_max;
    while offset >= config.offset_min {
        let candidate = latest_year - offset;
        let candidate_entities = joint_entities(store, metrics, candidate);
        let overlap: BTreeSet<String> = latest_entities
            .intersection(&candidate_entities)
            .cloned()
            .collect();
        if overlap.len() >= config.overlap_threshold {
            return Ok(WindowSelection {
                latest_year,
                base_year: candidate,
                overlap,
            });
        }
        best_overlap = best_overlap.max(overlap.len());
        offset -= 1;
    }

    Err(WindowError::InsufficientOverlap {
        threshold: config.overlap_threshold,
        best_overlap,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Record;

    fn record(entity: &str, metric: &str, year: i32, value: f64) -> Record {
        Record {
            entity: entity.to_string(),
            metric: metric.to_string(),
            year,
            value: Some(value),
            recognized: true,
        }
    }

    /// Store with `n` entities carrying `metric` in each given year.
    fn store_with(metric: &str, years_and_counts: &[(i32, usize)]) -> NormalizedStore {
        let mut records = Vec::new();
        for &(year, count) in years_and_counts {
            for i in 0..count {
                records.push(record(&format!("Country{:03}", i), metric, year, 1.0));
            }
        }
        NormalizedStore::from_records(records)
    }

    #[test]
    fn test_prefers_largest_offset() {
        let store = store_with("gdp", &[(2010, 40), (2020, 40)]);
        let config = WindowConfig::default();
        let win = select_window(&store, &["gdp"], &config).unwrap();
        assert_eq!(win.latest_year, 2020);
        assert_eq!(win.base_year, 2010);
        assert_eq!(win.overlap.len(), 40);
    }

    #[test]
    fn test_falls_back_to_offset_meeting_threshold() {
        // Exactly threshold entities at offset 8, nothing at 9-10.
        let store = store_with("gdp", &[(2012, 30), (2020, 35)]);
        let config = WindowConfig::default();
        let win = select_window(&store, &["gdp"], &config).unwrap();
        assert_eq!(win.latest_year, 2020);
        assert_eq!(win.base_year, 2012);
        assert_eq!(win.overlap.len(), 30);
    }

    #[test]
    fn test_insufficient_overlap_reported_not_guessed() {
        let store = store_with("gdp", &[(2012, 10), (2020, 35)]);
        let config = WindowConfig::default();
        let err = select_window(&store, &["gdp"], &config).unwrap_err();
        assert_eq!(
            err,
            WindowError::InsufficientOverlap {
                threshold: 30,
                best_overlap: 10
            }
        );
    }

    #[test]
    fn test_two_metric_window_intersects_both() {
        let mut records = Vec::new();
        for i in 0..40 {
            let e = format!("Country{:03}", i);
            records.push(record(&e, "gdp", 2010, 1.0));
            records.push(record(&e, "gdp", 2020, 2.0));
            // Only 32 entities also carry renewables in both years.
            if i < 32 {
                records.push(record(&e, "renewables_consumption", 2010, 1.0));
                records.push(record(&e, "renewables_consumption", 2020, 2.0));
            }
        }
        let store = NormalizedStore::from_records(records);
        let config = WindowConfig::default();
        let win =
            select_window(&store, &["gdp", "renewables_consumption"], &config).unwrap();
        assert_eq!(win.base_year, 2010);
        assert_eq!(win.overlap.len(), 32);
    }

    #[test]
    fn test_latest_year_requires_all_metrics() {
        let mut records = Vec::new();
        for i in 0..35 {
            let e = format!("Country{:03}", i);
            records.push(record(&e, "gdp", 2011, 1.0));
            records.push(record(&e, "gdp", 2021, 2.0));
            records.push(record(&e, "renewables_consumption", 2011, 1.0));
            records.push(record(&e, "renewables_consumption", 2021, 2.0));
        }
        // gdp alone extends to 2022, but renewables stops at 2021.
        records.push(record("Country000", "gdp", 2022, 3.0));
        let store = NormalizedStore::from_records(records);
        let win = select_window(
            &store,
            &["gdp", "renewables_consumption"],
            &WindowConfig::default(),
        )
        .unwrap();
        assert_eq!(win.latest_year, 2021);
    }

    #[test]
    fn test_no_data() {
        let store = NormalizedStore::from_records(vec![]);
        let err = select_window(&store, &["gdp"], &WindowConfig::default()).unwrap_err();
        assert_eq!(err, WindowError::NoData);
    }
}
