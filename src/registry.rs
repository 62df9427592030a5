// 📚 Schema Registry
// Canonical metric names, alias resolution, and entity classification

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ============================================================================
// CANONICAL METRIC
// ============================================================================

/// CanonicalMetric - Result of alias resolution
///
/// `recognized = false` means the raw label did not match any known series.
/// The label is kept (cleaned) rather than dropped, so downstream code can
/// still inspect raw data and decide what to do with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMetric {
    pub name: String,
    pub recognized: bool,
}

// ============================================================================
// ENTITY CLASSIFICATION
// ============================================================================

/// EntityClass - What kind of row-block label an entity is
///
/// The normalizer treats entities as opaque strings; classification is a
/// registry concern. Sources mix individual countries with continent rows
/// ("Asia", "Europe") and income-group rows ("High-income countries").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityClass {
    Country,
    RegionalAggregate,
    IncomeAggregate,
}

impl EntityClass {
    pub fn name(&self) -> &str {
        match self {
            EntityClass::Country => "Country",
            EntityClass::RegionalAggregate => "RegionalAggregate",
            EntityClass::IncomeAggregate => "IncomeAggregate",
        }
    }

    /// Aggregates must be excluded from cross-country rankings and
    /// concentration sums, otherwise "World" dominates every share.
    pub fn is_aggregate(&self) -> bool {
        !matches!(self, EntityClass::Country)
    }
}

// ============================================================================
// METRIC REGISTRY
// ============================================================================

/// MetricRegistry - Pure lookup tables, no side effects
///
/// Maps raw column/row labels (unit suffixes, inconsistent casing and
/// whitespace) to canonical metric names, and knows which canonical metrics
/// each report needs. "Not found" is returned, never thrown - callers decide
/// whether a missing required metric is fatal for their report.
pub struct MetricRegistry {
    aliases: HashMap<String, String>,
    required: HashMap<String, BTreeSet<String>>,
    regional_aggregates: BTreeSet<String>,
    income_aggregates: BTreeSet<String>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        let mut aliases = HashMap::new();

        // Canonical name → accepted raw spellings (after cleaning).
        // Recovered from the OWID export column set and the EIA
        // petroleum-liquids export row labels.
        let table: &[(&str, &[&str])] = &[
            ("coal_consumption", &["coal_consumption", "coal"]),
            ("oil_consumption", &["oil_consumption", "oil"]),
            ("gas_consumption", &["gas_consumption", "natural_gas", "gas"]),
            (
                "fossil_fuel_consumption",
                &["fossil_fuel_consumption", "fossil_fuels", "fossil_total"],
            ),
            (
                "renewables_consumption",
                &["renewables_consumption", "renewables"],
            ),
            (
                "renewables_share_energy",
                &["renewables_share_energy", "renewables_share"],
            ),
            ("solar_share_energy", &["solar_share_energy", "solar"]),
            ("wind_share_energy", &["wind_share_energy", "wind"]),
            ("hydro_share_energy", &["hydro_share_energy", "hydro"]),
            ("biofuel_share_energy", &["biofuel_share_energy", "biofuels"]),
            ("gdp", &["gdp", "gdp_ppp"]),
            ("population", &["population"]),
            ("energy_per_gdp", &["energy_per_gdp", "energy_intensity"]),
            (
                "petroleum_production",
                &[
                    "petroleum_production",
                    "total_petroleum_and_other_liquids",
                    "crude_oil_including_lease_condensate",
                    "crude_oil",
                ],
            ),
            (
                "refined_products_production",
                &["refined_products_production", "refinery_processing_gain"],
            ),
            (
                "natural_gas_liquids_production",
                &["natural_gas_liquids_production", "natural_gas_plant_liquids"],
            ),
        ];

        for (canonical, raws) in table {
            for raw in *raws {
                aliases.insert((*raw).to_string(), (*canonical).to_string());
            }
        }

        let mut required = HashMap::new();
        required.insert(
            "fossil_reduction".to_string(),
            to_set(&["coal_consumption", "oil_consumption", "gas_consumption"]),
        );
        required.insert(
            "gdp_renewables_correlation".to_string(),
            to_set(&["gdp", "renewables_consumption"]),
        );
        required.insert(
            "renewable_diversity".to_string(),
            to_set(&[
                "solar_share_energy",
                "wind_share_energy",
                "hydro_share_energy",
                "biofuel_share_energy",
            ]),
        );
        required.insert(
            "production_concentration".to_string(),
            to_set(&["petroleum_production"]),
        );

        let regional_aggregates = to_set(&[
            "world",
            "asia",
            "europe",
            "africa",
            "north america",
            "south america",
            "oceania",
            "european union",
        ]);
        let income_aggregates = to_set(&[
            "high-income countries",
            "upper-middle-income countries",
            "lower-middle-income countries",
            "low-income countries",
        ]);

        MetricRegistry {
            aliases,
            required,
            regional_aggregates,
            income_aggregates,
        }
    }

    /// Resolve a raw series label to its canonical metric name.
    ///
    /// Cleaning: trim, lowercase, strip a trailing "(...)" unit suffix
    /// (e.g. "Crude oil (Mb/d)"), collapse whitespace runs to `_`.
    /// Unmapped labels come back cleaned with `recognized = false`.
    pub fn canonicalize(&self, raw_label: &str) -> CanonicalMetric {
        let cleaned = clean_label(raw_label);
        match self.aliases.get(&cleaned) {
            Some(canonical) => CanonicalMetric {
                name: canonical.clone(),
                recognized: true,
            },
            None => CanonicalMetric {
                name: cleaned,
                recognized: false,
            },
        }
    }

    /// Required canonical metrics for a report, if the report is known.
    pub fn required_metrics(&self, report_id: &str) -> Option<&BTreeSet<String>> {
        self.required.get(report_id)
    }

    /// Classify an entity label. Unknown labels default to `Country`.
    pub fn classify_entity(&self, entity: &str) -> EntityClass {
        let lower = entity.trim().to_lowercase();
        if self.regional_aggregates.contains(&lower) {
            EntityClass::RegionalAggregate
        } else if self.income_aggregates.contains(&lower) {
            EntityClass::IncomeAggregate
        } else {
            EntityClass::Country
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// LABEL CLEANING
// ============================================================================

/// Normalize a raw label: trim, lowercase, drop a trailing unit suffix in
/// parentheses, join whitespace runs with `_`.
///
/// A label that is nothing but a parenthesized suffix ("(Mb/d)") keeps it -
/// stripping would leave an empty metric name.
fn clean_label(raw: &str) -> String {
    let mut s = raw.trim().to_lowercase();

    // "crude oil (mb/d)" → "crude oil"
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            if !s[..open].trim().is_empty() {
                s.truncate(open);
            }
        }
    }

    s.split_whitespace().collect::<Vec<_>>().join("_")
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_known_metric() {
        let registry = MetricRegistry::new();
        let m = registry.canonicalize("Coal Consumption");
        assert_eq!(m.name, "coal_consumption");
        assert!(m.recognized);
    }

    #[test]
    fn test_canonicalize_strips_unit_suffix() {
        let registry = MetricRegistry::new();
        let m = registry.canonicalize("  Crude oil (Mb/d) ");
        assert_eq!(m.name, "petroleum_production");
        assert!(m.recognized);
    }

    #[test]
    fn test_canonicalize_collapses_whitespace() {
        let registry = MetricRegistry::new();
        let m = registry.canonicalize("Natural   Gas");
        assert_eq!(m.name, "gas_consumption");
        assert!(m.recognized);
    }

    #[test]
    fn test_canonicalize_unmapped_label_retained() {
        let registry = MetricRegistry::new();
        let m = registry.canonicalize("Hydrogen Imports (TWh)");
        assert_eq!(m.name, "hydrogen_imports");
        assert!(!m.recognized);
    }

    #[test]
    fn test_fully_parenthesized_label_not_emptied() {
        let registry = MetricRegistry::new();
        let m = registry.canonicalize("(Mb/d)");
        assert_eq!(m.name, "(mb/d)");
        assert!(!m.recognized);
    }

    #[test]
    fn test_required_metrics_known_report() {
        let registry = MetricRegistry::new();
        let required = registry.required_metrics("fossil_reduction").unwrap();
        assert!(required.contains("coal_consumption"));
        assert!(required.contains("oil_consumption"));
        assert!(required.contains("gas_consumption"));
    }

    #[test]
    fn test_required_metrics_unknown_report() {
        let registry = MetricRegistry::new();
        assert!(registry.required_metrics("no_such_report").is_none());
    }

    #[test]
    fn test_classify_entity() {
        let registry = MetricRegistry::new();
        assert_eq!(registry.classify_entity("India"), EntityClass::Country);
        assert_eq!(
            registry.classify_entity("World"),
            EntityClass::RegionalAggregate
        );
        assert_eq!(
            registry.classify_entity("High-income countries"),
            EntityClass::IncomeAggregate
        );
        assert!(registry.classify_entity("European Union").is_aggregate());
        assert!(!registry.classify_entity("Germany").is_aggregate());
    }
}
