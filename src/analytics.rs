// 📈 Analytics Transform Library
// Pure, deterministic transforms over normalized projections

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// OUTCOMES
// ============================================================================

/// Outcome - Per-computation result variant.
///
/// Expected edge cases (zero denominator, too few observations) are ordinary
/// values, never panics or errors: a batch over many entities reports one
/// outcome per entity and a single bad entity never aborts the batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Outcome {
    Value(f64),
    /// Zero-denominator: the comparison is mathematically undefined.
    Undefined,
    /// Too few observations to compute anything meaningful.
    InsufficientData,
}

impl Outcome {
    pub fn value(&self) -> Option<f64> {
        match self {
            Outcome::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// AnalyticsError - Contract violations only. These indicate a caller bug,
/// not a data condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Paired vectors of different lengths.
    ShapeMismatch { left: usize, right: usize },
    /// A share value below zero where shares are required.
    NegativeShare,
}

impl std::fmt::Display for AnalyticsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyticsError::ShapeMismatch { left, right } => {
                write!(f, "Paired vectors differ in length: {} vs {}", left, right)
            }
            AnalyticsError::NegativeShare => write!(f, "Share values must be non-negative"),
        }
    }
}

impl std::error::Error for AnalyticsError {}

// ============================================================================
// PERCENTAGE CHANGE
// ============================================================================

/// EntityChange - One entity's change between the base and latest year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityChange {
    pub entity: String,
    pub base: f64,
    pub latest: f64,
    pub change: Outcome,
}

/// Per-entity percentage change `(latest - base) / base * 100`.
///
/// Restricted to entities present in BOTH maps (the maps already exclude
/// absent values). `base == 0` yields `Undefined` for that entity only;
/// every other entity in the batch still gets a numeric result.
pub fn percentage_change(
    latest: &BTreeMap<String, f64>,
    base: &BTreeMap<String, f64>,
) -> Vec<EntityChange> {
    let mut changes = Vec::new();
    for (entity, &latest_value) in latest {
        let Some(&base_value) = base.get(entity) else {
            continue;
        };
        let change = if base_value == 0.0 {
            Outcome::Undefined
        } else {
            Outcome::Value((latest_value - base_value) / base_value * 100.0)
        };
        changes.push(EntityChange {
            entity: entity.clone(),
            base: base_value,
            latest: latest_value,
            change,
        });
    }
    changes
}

// ============================================================================
// PEARSON CORRELATION
// ============================================================================

/// Pearson correlation over paired observations.
///
/// Fewer than 2 pairs, or zero variance on either side, is
/// `InsufficientData` - not a degenerate value out of a zero denominator.
/// Mismatched lengths are a contract violation.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<Outcome, AnalyticsError> {
    if xs.len() != ys.len() {
        return Err(AnalyticsError::ShapeMismatch {
            left: xs.len(),
            right: ys.len(),
        });
    }
    let n = xs.len();
    if n < 2 {
        return Ok(Outcome::InsufficientData);
    }

    let nf = n as f64;
    let mean_x = xs.iter().sum::<f64>() / nf;
    let mean_y = ys.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&x, &y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return Ok(Outcome::InsufficientData);
    }

    Ok(Outcome::Value(cov / (var_x.sqrt() * var_y.sqrt())))
}

// ============================================================================
// SHANNON DIVERSITY INDEX
// ============================================================================

/// Shannon diversity `-Σ p·ln(p)` over strictly positive shares.
///
/// Zero shares contribute 0 by limit and are excluded before the log, so
/// `ln(0)` never happens. Shares need not sum to exactly 1 after upstream
/// filtering; they are renormalized over the positive subset.
pub fn shannon_diversity(shares: &[f64]) -> Result<Outcome, AnalyticsError> {
    if shares.iter().any(|&s| s < 0.0) {
        return Err(AnalyticsError::NegativeShare);
    }

    let positive: Vec<f64> = shares.iter().copied().filter(|&s| s > 0.0).collect();
    if positive.is_empty() {
        return Ok(Outcome::InsufficientData);
    }

    let total: f64 = positive.iter().sum();
    let index = -positive
        .iter()
        .map(|&s| {
            let p = s / total;
            p * p.ln()
        })
        .sum::<f64>();

    Ok(Outcome::Value(index))
}

// ============================================================================
// HERFINDAHL-HIRSCHMAN CONCENTRATION INDEX
// ============================================================================

/// HHI over market shares: `Σ share² × 10_000`, shares as fractions of the
/// total over INCLUDED entities only.
///
/// Absent values are excluded up front and the total is recomputed over what
/// remains - never divide by a total computed before exclusion. A market of
/// one entity pins at 10_000; shares 0.6/0.4 give 5_200.
pub fn herfindahl_index(values: &BTreeMap<String, Option<f64>>) -> Outcome {
    let included: Vec<f64> = values.values().filter_map(|v| *v).collect();
    let total: f64 = included.iter().sum();
    if included.is_empty() || total <= 0.0 {
        return Outcome::InsufficientData;
    }

    let index = included
        .iter()
        .map(|&v| {
            let share = v / total;
            share * share
        })
        .sum::<f64>()
        * 10_000.0;

    Outcome::Value(index)
}

// ============================================================================
// TESTS
// ============================================================================
