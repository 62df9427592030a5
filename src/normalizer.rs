// 🏗️ Source Normalizer
// Turns an ambiguous, header-interleaved wide table into tidy records

use crate::registry::MetricRegistry;
use crate::source::RawGrid;
use crate::store::Record;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// CONFIG
// ============================================================================

/// NormalizerConfig - Explicit configuration instead of ambient globals.
///
/// Agency exports in this layout family mark the start of each entity block
/// with a literal marker row ("Production") and leave the top of the sheet
/// implicitly scoped to a default aggregate ("World").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub block_marker: String,
    pub default_entity: String,
    pub year_min: i32,
    pub year_max: i32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        NormalizerConfig {
            block_marker: "Production".to_string(),
            default_entity: "World".to_string(),
            year_min: 1900,
            year_max: 2100,
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// NormalizeError - Fatal per source load.
///
/// Anything less than "the grid cannot be interpreted at all" is handled
/// locally: malformed rows are skipped and counted, never escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// No series-code/series-name column pair could be identified.
    MissingStructuralColumn(String),
}

impl std::fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalizeError::MissingStructuralColumn(detail) => {
                write!(f, "Missing structural column: {}", detail)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

// ============================================================================
// NORMALIZE REPORT
// ============================================================================

/// NormalizeReport - Diagnostics for one source load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub header_rows: usize,
    pub data_rows: usize,
    pub structural_rows: usize,
    /// Data rows before the first block header, attributed to the
    /// default entity.
    pub preamble_rows: usize,
    /// Malformed data rows skipped whole (e.g. blank series name).
    pub skipped_rows: usize,
    /// Non-empty cells that failed numeric coercion.
    pub skipped_cells: usize,
    /// Data rows whose metric label the registry did not recognize.
    pub unrecognized_metrics: usize,
}

// ============================================================================
// GRID LAYOUT DETECTION
// ============================================================================

/// Column layout inferred from headers, not fixed offsets - header sets vary
/// by source version, so year columns are matched by pattern wherever they
/// sit, and the code/name pair is found by keyword with positional fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
struct GridLayout {
    code_col: usize,
    name_col: usize,
    /// (column index, parsed year)
    year_cols: Vec<(usize, i32)>,
}

fn detect_layout(grid: &RawGrid, config: &NormalizerConfig) -> Result<GridLayout, NormalizeError> {
    let mut year_cols = Vec::new();
    let mut meta_cols = Vec::new();

    for (i, header) in grid.headers.iter().enumerate() {
        match parse_year_header(header) {
            Some(year) if (config.year_min..=config.year_max).contains(&year) => {
                year_cols.push((i, year))
            }
            // A 4-digit header outside plausible bounds is metadata, not a year.
            _ => meta_cols.push(i),
        }
    }

    if meta_cols.len() < 2 {
        return Err(NormalizeError::MissingStructuralColumn(format!(
            "need a series-code and a series-name column, found {} non-year column(s)",
            meta_cols.len()
        )));
    }

    let find = |keywords: &[&str], exclude: Option<usize>| {
        meta_cols.iter().copied().find(|&i| {
            if Some(i) == exclude {
                return false;
            }
            let h = grid.headers[i].to_lowercase();
            keywords.iter().any(|k| h.contains(k))
        })
    };

    let code_col = find(&["code"], None).unwrap_or(meta_cols[0]);
    let name_col = find(&["name", "series", "country", "entity"], Some(code_col))
        .unwrap_or_else(|| {
            meta_cols
                .iter()
                .copied()
                .find(|&c| c != code_col)
                .unwrap_or(meta_cols[1])
        });

    Ok(GridLayout {
        code_col,
        name_col,
        year_cols,
    })
}

/// Exact 4-digit numeric header match.
fn parse_year_header(header: &str) -> Option<i32> {
    let trimmed = header.trim();
    if trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()) {
        trimmed.parse().ok()
    } else {
        None
    }
}

// ============================================================================
// CONTEXT TRACKER
// ============================================================================

/// How the tracker classified one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    /// Structural row signaling a new entity block.
    Header,
    /// Row echoing an entity name or the block marker; not a data point.
    Structural,
    /// Data row, tagged with the active entity.
    Data { entity: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackerState {
    SeekingEntity,
    InBlock,
}

/// ContextTracker - Two-state machine recovering entity blocks from row
/// position alone.
///
/// The layout gives no explicit schema: a block is "an entity name row,
/// then a marker row, then metric rows". The name row and the marker row
/// are BOTH header rows, and both must resolve to the same entity - the
/// entity pointer only advances when the immediately preceding row was a
/// name-only row, so the marker row captures the name exactly once.
pub struct ContextTracker {
    block_marker: String,
    active_entity: String,
    state: TrackerState,
    seen_entities: BTreeSet<String>,
    /// Name of the previous row iff that row was name-only
    /// (blank code, non-blank name, not the marker).
    prev_name_only: Option<String>,
}

impl ContextTracker {
    pub fn new(config: &NormalizerConfig) -> Self {
        let mut seen_entities = BTreeSet::new();
        seen_entities.insert(config.default_entity.clone());
        ContextTracker {
            block_marker: config.block_marker.clone(),
            active_entity: config.default_entity.clone(),
            state: TrackerState::SeekingEntity,
            seen_entities,
            prev_name_only: None,
        }
    }

    /// Classify one row given its series-code and series-name cells.
    /// Rows must be fed top to bottom, exactly once each.
    pub fn observe(&mut self, code: &str, name: &str) -> RowKind {
        let code = code.trim();
        let name = name.trim();
        let is_marker = name == self.block_marker;
        let is_header = code.is_empty() || is_marker;

        if is_header {
            if let Some(prev_name) = self.prev_name_only.take() {
                self.active_entity = prev_name;
                self.seen_entities.insert(self.active_entity.clone());
            }
            self.state = TrackerState::InBlock;
            self.prev_name_only = if code.is_empty() && !name.is_empty() && !is_marker {
                Some(name.to_string())
            } else {
                None
            };
            return RowKind::Header;
        }

        // Data candidate; rows echoing the marker or a known entity are
        // structural noise (repeated header blocks), not data points.
        self.prev_name_only = None;
        if self.seen_entities.contains(name) {
            return RowKind::Structural;
        }

        RowKind::Data {
            entity: self.active_entity.clone(),
        }
    }

    pub fn active_entity(&self) -> &str {
        &self.active_entity
    }

    pub fn in_block(&self) -> bool {
        self.state == TrackerState::InBlock
    }
}

// ============================================================================
// MELT STAGE
// ============================================================================

/// Coerce one value cell.
///
/// Empty cells and the usual "no data" placeholders stay absent - NOT zero,
/// the series would be corrupted otherwise. Non-empty garbage also yields
/// absence but is counted, so callers can tell a clean sparse source from a
/// garbled one.
fn coerce_value(cell: &str) -> (Option<f64>, bool) {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return (None, false);
    }
    match trimmed.to_lowercase().as_str() {
        "--" | "-" | ".." | "n/a" | "na" => return (None, false),
        _ => {}
    }
    let cleaned: String = trimmed.chars().filter(|&c| c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(v) => (Some(v), false),
        Err(_) => (None, true),
    }
}

/// Normalize one raw grid into flat records.
///
/// Single pass, top to bottom. The only fatal failure is an uninterpretable
/// grid (`MissingStructuralColumn`); a single bad row or cell never aborts
/// the load, it is counted in the report instead.
pub fn normalize(
    grid: &RawGrid,
    registry: &MetricRegistry,
    config: &NormalizerConfig,
) -> Result<(Vec<Record>, NormalizeReport), NormalizeError> {
    let layout = detect_layout(grid, config)?;
    let mut tracker = ContextTracker::new(config);
    let mut report = NormalizeReport::default();
    let mut records = Vec::new();

    for row in 0..grid.row_count() {
        report.total_rows += 1;
        let code = grid.cell(row, layout.code_col);
        let name = grid.cell(row, layout.name_col);

        match tracker.observe(code, name) {
            RowKind::Header => {
                report.header_rows += 1;
            }
            RowKind::Structural => {
                report.structural_rows += 1;
            }
            RowKind::Data { entity } => {
                if name.trim().is_empty() {
                    report.skipped_rows += 1;
                    debug!("Skipped data row {} with blank series name", row + 2);
                    continue;
                }
                report.data_rows += 1;
                if !tracker.in_block() {
                    report.preamble_rows += 1;
                }
                let metric = registry.canonicalize(name);
                if !metric.recognized {
                    report.unrecognized_metrics += 1;
                    debug!("Unrecognized metric label kept as-is: {:?}", name);
                }
                for &(col, year) in &layout.year_cols {
                    let (value, garbled) = coerce_value(grid.cell(row, col));
                    if garbled {
                        report.skipped_cells += 1;
                        debug!(
                            "Skipped unparseable cell at row {}, year {}: {:?}",
                            row + 2,
                            year,
                            grid.cell(row, col)
                        );
                    }
                    records.push(Record {
                        entity: entity.clone(),
                        metric: metric.name.clone(),
                        year,
                        value,
                        recognized: metric.recognized,
                    });
                }
            }
        }
    }

    if report.skipped_cells > 0 {
        warn!(
            "Normalized source with {} unparseable cell(s) skipped",
            report.skipped_cells
        );
    }

    Ok((records, report))
}

// ============================================================================
// TESTS
// ============================================================================
