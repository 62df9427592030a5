// 📊 Report Compositions
// The repeated analytical questions every downstream report asks

use crate::analytics::{
    herfindahl_index, pearson_correlation, percentage_change, shannon_diversity, AnalyticsError,
    EntityChange, Outcome,
};
use crate::query::Selection;
use crate::registry::MetricRegistry;
use crate::store::NormalizedStore;
use crate::window::{select_window, WindowConfig, WindowError, WindowSelection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// REPORT CONFIG
// ============================================================================

/// ReportConfig - The inbound report-configuration contract.
///
/// Rendering layers hand this in; everything else (which metrics, which
/// window policy) is resolved here against the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub report_id: String,
    pub entity_filter: Option<BTreeSet<String>>,
    pub year_range: Option<(i32, i32)>,
    pub window: WindowConfig,
}

impl ReportConfig {
    pub fn new(report_id: impl Into<String>) -> Self {
        ReportConfig {
            report_id: report_id.into(),
            entity_filter: None,
            year_range: None,
            window: WindowConfig::default(),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    UnknownReport(String),
    /// A required metric has no data at all in the loaded source.
    MissingRequiredMetric { report: String, metric: String },
    Window(WindowError),
    Analytics(AnalyticsError),
}

impl std::fmt::Display for ReportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportError::UnknownReport(id) => write!(f, "Unknown report: {}", id),
            ReportError::MissingRequiredMetric { report, metric } => {
                write!(f, "Report {} requires metric {} which the source lacks", report, metric)
            }
            ReportError::Window(e) => write!(f, "Window selection failed: {}", e),
            ReportError::Analytics(e) => write!(f, "Analytics contract violation: {}", e),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<WindowError> for ReportError {
    fn from(e: WindowError) -> Self {
        ReportError::Window(e)
    }
}

impl From<AnalyticsError> for ReportError {
    fn from(e: AnalyticsError) -> Self {
        ReportError::Analytics(e)
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Check every required metric for a report has at least one data year.
fn check_required(
    store: &NormalizedStore,
    registry: &MetricRegistry,
    report_id: &str,
) -> Result<Vec<String>, ReportError> {
    let required = registry
        .required_metrics(report_id)
        .ok_or_else(|| ReportError::UnknownReport(report_id.to_string()))?;
    for metric in required {
        if store.years_for(metric).is_empty() {
            return Err(ReportError::MissingRequiredMetric {
                report: report_id.to_string(),
                metric: metric.clone(),
            });
        }
    }
    Ok(required.iter().cloned().collect())
}

/// Restrict a store to a config's year range (and entity filter, if any)
/// through the query layer, rebuilding a store over the slice.
fn scoped_store(store: &NormalizedStore, config: &ReportConfig) -> NormalizedStore {
    if config.year_range.is_none() && config.entity_filter.is_none() {
        return store.clone();
    }
    let mut selection = Selection::new();
    if let Some((from, to)) = config.year_range {
        selection = selection.with_year_range(from, to);
    }
    if let Some(entities) = &config.entity_filter {
        selection = selection.with_entities(entities.iter().cloned());
    }
    NormalizedStore::from_records(selection.select(store).records().to_vec())
}

/// Per-entity sum of component metrics with absence propagation: any absent
/// component makes the whole sum absent for that entity. Summing around a
/// hole would understate the total and corrupt the ranking.
fn composite_values(
    store: &NormalizedStore,
    metrics: &[String],
    year: i32,
) -> BTreeMap<String, f64> {
    let per_metric: Vec<BTreeMap<String, f64>> =
        metrics.iter().map(|m| store.values_for(m, year)).collect();
    let Some(first) = per_metric.first() else {
        return BTreeMap::new();
    };

    let mut sums = BTreeMap::new();
    'entities: for entity in first.keys() {
        let mut total = 0.0;
        for values in &per_metric {
            match values.get(entity) {
                Some(v) => total += v,
                None => continue 'entities,
            }
        }
        sums.insert(entity.clone(), total);
    }
    sums
}

// ============================================================================
// FOSSIL REDUCTION RANKING
// ============================================================================

/// FossilReductionReport - Which entities cut their summed fossil
/// consumption the most over the selected window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FossilReductionReport {
    pub latest_year: i32,
    pub base_year: i32,
    /// Sorted ascending by change: biggest reducers first.
    pub rankings: Vec<EntityChange>,
}

pub fn fossil_reduction(
    store: &NormalizedStore,
    registry: &MetricRegistry,
    config: &ReportConfig,
) -> Result<FossilReductionReport, ReportError> {
    let metrics = check_required(store, registry, "fossil_reduction")?;
    let store = scoped_store(store, config);

    // Joint presence of every component == the composite sum being defined,
    // so the window can be selected over the component metrics directly.
    let metric_refs: Vec<&str> = metrics.iter().map(String::as_str).collect();
    let window = select_window(&store, &metric_refs, &config.window)?;

    let latest = composite_values(&store, &metrics, window.latest_year);
    let base = composite_values(&store, &metrics, window.base_year);

    let mut rankings: Vec<EntityChange> = percentage_change(&latest, &base)
        .into_iter()
        .filter(|c| !registry.classify_entity(&c.entity).is_aggregate())
        .collect();
    rankings.sort_by(|a, b| match (a.change.value(), b.change.value()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.entity.cmp(&b.entity),
    });

    Ok(FossilReductionReport {
        latest_year: window.latest_year,
        base_year: window.base_year,
        rankings,
    })
}

// ============================================================================
// TWO-METRIC CHANGE CORRELATION
// ============================================================================

/// CorrelationReport - Pearson r between two metrics' per-entity changes
/// over a shared window (e.g. GDP growth vs renewables growth).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub metric_a: String,
    pub metric_b: String,
    pub latest_year: i32,
    pub base_year: i32,
    /// Entities that produced a defined change for both metrics.
    pub paired_entities: usize,
    pub correlation: Outcome,
}

pub fn change_correlation(
    store: &NormalizedStore,
    config: &ReportConfig,
    metric_a: &str,
    metric_b: &str,
) -> Result<CorrelationReport, ReportError> {
    let store = scoped_store(store, config);
    let window: WindowSelection =
        select_window(&store, &[metric_a, metric_b], &config.window)?;

    let changes_a = change_map(&store, metric_a, &window);
    let changes_b = change_map(&store, metric_b, &window);

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (entity, a) in &changes_a {
        if let Some(b) = changes_b.get(entity) {
            xs.push(*a);
            ys.push(*b);
        }
    }

    let correlation = pearson_correlation(&xs, &ys)?;
    Ok(CorrelationReport {
        metric_a: metric_a.to_string(),
        metric_b: metric_b.to_string(),
        latest_year: window.latest_year,
        base_year: window.base_year,
        paired_entities: xs.len(),
        correlation,
    })
}

/// Entity → numeric change for one metric over a window. Undefined changes
/// (zero base) drop out of the pairing rather than poisoning it.
fn change_map(
    store: &NormalizedStore,
    metric: &str,
    window: &WindowSelection,
) -> BTreeMap<String, f64> {
    let latest = store.values_for(metric, window.latest_year);
    let base = store.values_for(metric, window.base_year);
    percentage_change(&latest, &base)
        .into_iter()
        .filter_map(|c| c.change.value().map(|v| (c.entity, v)))
        .collect()
}

// ============================================================================
// RENEWABLE DIVERSITY
// ============================================================================

/// DiversityReport - How evenly one entity's renewable mix is spread across
/// sub-sources in a year.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiversityReport {
    pub entity: String,
    pub year: i32,
    pub shares: BTreeMap<String, f64>,
    pub index: Outcome,
}

pub fn renewable_diversity(
    store: &NormalizedStore,
    registry: &MetricRegistry,
    entity: &str,
    year: Option<i32>,
) -> Result<DiversityReport, ReportError> {
    let metrics = check_required(store, registry, "renewable_diversity")?;

    let year = match year {
        Some(y) => y,
        None => metrics
            .iter()
            .flat_map(|m| store.years_for(m))
            .max()
            .ok_or(ReportError::Window(WindowError::NoData))?,
    };

    let mut shares = BTreeMap::new();
    for metric in &metrics {
        if let Some(value) = store.lookup(entity, metric, year) {
            shares.insert(metric.clone(), value);
        }
    }

    let values: Vec<f64> = shares.values().copied().collect();
    let index = shannon_diversity(&values)?;
    Ok(DiversityReport {
        entity: entity.to_string(),
        year,
        shares,
        index,
    })
}

// ============================================================================
// PRODUCTION CONCENTRATION
// ============================================================================

/// ConcentrationReport - HHI of one metric per year, countries only.
///
/// Aggregates ("World", continents, income groups) are excluded before the
/// total is computed; otherwise every country's share collapses against the
/// aggregate rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcentrationReport {
    pub metric: String,
    pub by_year: Vec<(i32, Outcome)>,
}

pub fn production_concentration(
    store: &NormalizedStore,
    registry: &MetricRegistry,
    metric: &str,
) -> Result<ConcentrationReport, ReportError> {
    if store.years_for(metric).is_empty() {
        return Err(ReportError::MissingRequiredMetric {
            report: "production_concentration".to_string(),
            metric: metric.to_string(),
        });
    }

    let mut by_year = Vec::new();
    for year in store.years_for(metric) {
        let values: BTreeMap<String, Option<f64>> = store
            .values_for(metric, year)
            .into_iter()
            .filter(|(entity, _)| !registry.classify_entity(entity).is_aggregate())
            .map(|(entity, value)| (entity, Some(value)))
            .collect();
        by_year.push((year, herfindahl_index(&values)));
    }

    Ok(ConcentrationReport {
        metric: metric.to_string(),
        by_year,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Record;

    fn record(entity: &str, metric: &str, year: i32, value: Option<f64>) -> Record {
        Record {
            entity: entity.to_string(),
            metric: metric.to_string(),
            year,
            value,
            recognized: true,
        }
    }

    /// 30+ countries with coal/oil/gas in 2010 and 2020 so the default
    /// window threshold is satisfiable.
    fn fossil_store() -> NormalizedStore {
        let mut records = Vec::new();
        for i in 0..32 {
            let e = format!("Country{:03}", i);
            for metric in ["coal_consumption", "oil_consumption", "gas_consumption"] {
                records.push(record(&e, metric, 2010, Some(100.0)));
                // Country000 cuts hardest, Country031 grows the most.
                records.push(record(&e, metric, 2020, Some(40.0 + 5.0 * i as f64)));
            }
        }
        // Aggregate rows must not appear in rankings.
        for metric in ["coal_consumption", "oil_consumption", "gas_consumption"] {
            records.push(record("World", metric, 2010, Some(10_000.0)));
            records.push(record("World", metric, 2020, Some(9_000.0)));
        }
        NormalizedStore::from_records(records)
    }

    #[test]
    fn test_fossil_reduction_ranks_biggest_reducers_first() {
        let store = fossil_store();
        let registry = MetricRegistry::new();
        let report =
            fossil_reduction(&store, &registry, &ReportConfig::new("fossil_reduction")).unwrap();
        assert_eq!(report.latest_year, 2020);
        assert_eq!(report.base_year, 2010);
        assert_eq!(report.rankings[0].entity, "Country000");
        assert!((report.rankings[0].change.value().unwrap() + 60.0).abs() < 1e-9);
        assert!(report.rankings.iter().all(|c| c.entity != "World"));
    }

    #[test]
    fn test_fossil_reduction_absence_propagates_into_sum() {
        let mut records = Vec::new();
        for i in 0..31 {
            let e = format!("Country{:03}", i);
            for metric in ["coal_consumption", "oil_consumption", "gas_consumption"] {
                records.push(record(&e, metric, 2010, Some(100.0)));
                records.push(record(&e, metric, 2020, Some(90.0)));
            }
        }
        // Spotty has oil+gas but a hole in coal for 2020: its sum must be
        // absent there, not a two-component sum.
        records.push(record("Spotty", "coal_consumption", 2010, Some(100.0)));
        records.push(record("Spotty", "oil_consumption", 2010, Some(100.0)));
        records.push(record("Spotty", "gas_consumption", 2010, Some(100.0)));
        records.push(record("Spotty", "coal_consumption", 2020, None));
        records.push(record("Spotty", "oil_consumption", 2020, Some(90.0)));
        records.push(record("Spotty", "gas_consumption", 2020, Some(90.0)));

        let store = NormalizedStore::from_records(records);
        let registry = MetricRegistry::new();
        let report =
            fossil_reduction(&store, &registry, &ReportConfig::new("fossil_reduction")).unwrap();
        assert!(report.rankings.iter().all(|c| c.entity != "Spotty"));
    }

    #[test]
    fn test_fossil_reduction_missing_required_metric() {
        let mut records = Vec::new();
        for i in 0..31 {
            let e = format!("Country{:03}", i);
            records.push(record(&e, "coal_consumption", 2010, Some(100.0)));
            records.push(record(&e, "coal_consumption", 2020, Some(90.0)));
        }
        let store = NormalizedStore::from_records(records);
        let registry = MetricRegistry::new();
        let err = fossil_reduction(&store, &registry, &ReportConfig::new("fossil_reduction"))
            .unwrap_err();
        assert!(matches!(err, ReportError::MissingRequiredMetric { .. }));
    }

    #[test]
    fn test_change_correlation_positive() {
        let mut records = Vec::new();
        for i in 0..32 {
            let e = format!("Country{:03}", i);
            records.push(record(&e, "gdp", 2010, Some(100.0)));
            records.push(record(&e, "gdp", 2020, Some(100.0 + i as f64)));
            records.push(record(&e, "renewables_consumption", 2010, Some(50.0)));
            records.push(record(&e, "renewables_consumption", 2020, Some(50.0 + i as f64)));
        }
        let store = NormalizedStore::from_records(records);
        let report = change_correlation(
            &store,
            &ReportConfig::new("gdp_renewables_correlation"),
            "gdp",
            "renewables_consumption",
        )
        .unwrap();
        assert_eq!(report.paired_entities, 32);
        let r = report.correlation.value().unwrap();
        assert!(r > 0.99, "expected strong positive correlation, got {}", r);
    }

    #[test]
    fn test_change_correlation_insufficient_overlap_surfaces() {
        let store = NormalizedStore::from_records(vec![
            record("India", "gdp", 2010, Some(1.0)),
            record("India", "gdp", 2020, Some(2.0)),
            record("India", "renewables_consumption", 2010, Some(1.0)),
            record("India", "renewables_consumption", 2020, Some(2.0)),
        ]);
        let err = change_correlation(
            &store,
            &ReportConfig::new("gdp_renewables_correlation"),
            "gdp",
            "renewables_consumption",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReportError::Window(WindowError::InsufficientOverlap { .. })
        ));
    }

    #[test]
    fn test_renewable_diversity_latest_year_default() {
        let store = NormalizedStore::from_records(vec![
            record("India", "solar_share_energy", 2021, Some(4.0)),
            record("India", "wind_share_energy", 2021, Some(3.0)),
            record("India", "hydro_share_energy", 2021, Some(3.0)),
            record("India", "biofuel_share_energy", 2021, Some(0.0)),
            record("India", "solar_share_energy", 2015, Some(1.0)),
        ]);
        let registry = MetricRegistry::new();
        let report = renewable_diversity(&store, &registry, "India", None).unwrap();
        assert_eq!(report.year, 2021);
        // 0.4/0.3/0.3 after renormalization, zero share excluded.
        let expected = -(0.4f64 * 0.4f64.ln() + 0.3 * 0.3f64.ln() + 0.3 * 0.3f64.ln());
        assert!((report.index.value().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_production_concentration_excludes_aggregates() {
        let store = NormalizedStore::from_records(vec![
            record("SaudiArabia", "petroleum_production", 2020, Some(60.0)),
            record("Norway", "petroleum_production", 2020, Some(40.0)),
            record("World", "petroleum_production", 2020, Some(100.0)),
        ]);
        let registry = MetricRegistry::new();
        let report = production_concentration(&store, &registry, "petroleum_production").unwrap();
        assert_eq!(report.by_year.len(), 1);
        let (year, outcome) = report.by_year[0];
        assert_eq!(year, 2020);
        assert!((outcome.value().unwrap() - 5200.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_report_id() {
        let store = NormalizedStore::from_records(vec![]);
        let registry = MetricRegistry::new();
        let err = check_required(&store, &registry, "nope").unwrap_err();
        assert_eq!(err, ReportError::UnknownReport("nope".to_string()));
    }
}
