// 🗃️ Normalized Store
// Immutable (entity, metric, year) → value collection for one loaded source

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// RECORD
// ============================================================================

/// Record - The atomic unit of normalized data.
///
/// `value = None` means "no data", which is NOT the same as zero consumption.
/// The analytics layer depends on that distinction. `recognized` is the
/// Schema Registry's verdict on the metric label: unmapped labels are kept
/// and flagged rather than dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity: String,
    pub metric: String,
    pub year: i32,
    pub value: Option<f64>,
    pub recognized: bool,
}

// ============================================================================
// NORMALIZED STORE
// ============================================================================

/// NormalizedStore - Read-only after construction.
///
/// Indexed by (metric, year) because the window selector's overlap
/// computations dominate query volume. Records are kept sorted by
/// (entity, metric, year) so two normalizations of the same source are
/// bit-identical.
#[derive(Debug, Clone, Default)]
pub struct NormalizedStore {
    records: Vec<Record>,
    // (metric, year) → entity → value
    by_metric_year: HashMap<(String, i32), BTreeMap<String, Option<f64>>>,
    years_by_metric: HashMap<String, BTreeSet<i32>>,
}

impl NormalizedStore {
    /// Build a store from raw records.
    ///
    /// Duplicate (entity, metric, year) triples overwrite (last write wins):
    /// source exports occasionally repeat whole header blocks, and the later
    /// occurrence is taken as the corrected one.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut deduped: BTreeMap<(String, String, i32), Record> = BTreeMap::new();
        for record in records {
            let key = (
                record.entity.clone(),
                record.metric.clone(),
                record.year,
            );
            deduped.insert(key, record);
        }

        let mut by_metric_year: HashMap<(String, i32), BTreeMap<String, Option<f64>>> =
            HashMap::new();
        let mut years_by_metric: HashMap<String, BTreeSet<i32>> = HashMap::new();
        for record in deduped.values() {
            by_metric_year
                .entry((record.metric.clone(), record.year))
                .or_default()
                .insert(record.entity.clone(), record.value);
            years_by_metric
                .entry(record.metric.clone())
                .or_default()
                .insert(record.year);
        }

        NormalizedStore {
            records: deduped.into_values().collect(),
            by_metric_year,
            years_by_metric,
        }
    }

    /// Value for one (entity, metric, year). `None` covers both "no record"
    /// and "record present but value absent".
    pub fn lookup(&self, entity: &str, metric: &str, year: i32) -> Option<f64> {
        self.by_metric_year
            .get(&(metric.to_string(), year))
            .and_then(|entities| entities.get(entity))
            .copied()
            .flatten()
    }

    /// Entities with a non-absent value for (metric, year).
    pub fn entities_with(&self, metric: &str, year: i32) -> BTreeSet<String> {
        self.by_metric_year
            .get(&(metric.to_string(), year))
            .map(|entities| {
                entities
                    .iter()
                    .filter(|(_, v)| v.is_some())
                    .map(|(e, _)| e.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Years that carry at least one non-absent value for a metric.
    pub fn years_for(&self, metric: &str) -> BTreeSet<i32> {
        self.years_by_metric
            .get(metric)
            .map(|years| {
                years
                    .iter()
                    .filter(|&&y| {
                        self.by_metric_year
                            .get(&(metric.to_string(), y))
                            .map(|entities| entities.values().any(|v| v.is_some()))
                            .unwrap_or(false)
                    })
                    .copied()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Entity → value map for one (metric, year), non-absent values only.
    pub fn values_for(&self, metric: &str, year: i32) -> BTreeMap<String, f64> {
        self.by_metric_year
            .get(&(metric.to_string(), year))
            .map(|entities| {
                entities
                    .iter()
                    .filter_map(|(e, v)| v.map(|v| (e.clone(), v)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All records, sorted by (entity, metric, year).
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(entity: &str, metric: &str, year: i32, value: Option<f64>) -> Record {
        Record {
            entity: entity.to_string(),
            metric: metric.to_string(),
            year,
            value,
            recognized: true,
        }
    }

    #[test]
    fn test_lookup() {
        let store = NormalizedStore::from_records(vec![
            record("India", "coal_consumption", 2020, Some(100.0)),
            record("India", "coal_consumption", 2021, None),
        ]);
        assert_eq!(store.lookup("India", "coal_consumption", 2020), Some(100.0));
        assert_eq!(store.lookup("India", "coal_consumption", 2021), None);
        assert_eq!(store.lookup("India", "coal_consumption", 2019), None);
        assert_eq!(store.lookup("China", "coal_consumption", 2020), None);
    }

    #[test]
    fn test_duplicate_triple_last_write_wins() {
        let store = NormalizedStore::from_records(vec![
            record("India", "coal_consumption", 2020, Some(100.0)),
            record("India", "coal_consumption", 2020, Some(120.0)),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("India", "coal_consumption", 2020), Some(120.0));
    }

    #[test]
    fn test_entities_with_excludes_absent() {
        let store = NormalizedStore::from_records(vec![
            record("India", "gdp", 2020, Some(1.0)),
            record("China", "gdp", 2020, None),
            record("Brazil", "gdp", 2020, Some(2.0)),
        ]);
        let entities = store.entities_with("gdp", 2020);
        assert_eq!(entities.len(), 2);
        assert!(entities.contains("India"));
        assert!(entities.contains("Brazil"));
        assert!(!entities.contains("China"));
    }

    #[test]
    fn test_years_for_skips_all_absent_years() {
        let store = NormalizedStore::from_records(vec![
            record("India", "gdp", 2019, Some(1.0)),
            record("India", "gdp", 2020, None),
            record("China", "gdp", 2020, None),
        ]);
        let years = store.years_for("gdp");
        assert!(years.contains(&2019));
        assert!(!years.contains(&2020));
    }

    #[test]
    fn test_records_deterministic_order() {
        let a = NormalizedStore::from_records(vec![
            record("B", "gdp", 2020, Some(2.0)),
            record("A", "gdp", 2020, Some(1.0)),
        ]);
        let b = NormalizedStore::from_records(vec![
            record("A", "gdp", 2020, Some(1.0)),
            record("B", "gdp", 2020, Some(2.0)),
        ]);
        assert_eq!(a.records(), b.records());
    }
}
