// 📂 Raw Sources
// Source descriptors, the raw cell grid, and the fetch seam

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

// ============================================================================
// SOURCE DESCRIPTOR
// ============================================================================

/// SourceDescriptor - Identifies one raw table: where it came from plus a
/// content fingerprint.
///
/// The fingerprint is a SHA-256 of the raw bytes, so two loads of the same
/// path with different content are different descriptors and never share a
/// cached store. `loaded_at` is provenance only and excluded from identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub origin: String,
    pub fingerprint: String,
    pub loaded_at: DateTime<Utc>,
}

impl SourceDescriptor {
    pub fn new(origin: impl Into<String>, content: &[u8]) -> Self {
        SourceDescriptor {
            origin: origin.into(),
            fingerprint: fingerprint_bytes(content),
            loaded_at: Utc::now(),
        }
    }

    /// Cache key: origin + fingerprint. Content change → new key.
    pub fn cache_key(&self) -> String {
        format!("{}#{}", self.origin, self.fingerprint)
    }
}

impl PartialEq for SourceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.origin == other.origin && self.fingerprint == other.fingerprint
    }
}

impl Eq for SourceDescriptor {}

impl Hash for SourceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.origin.hash(state);
        self.fingerprint.hash(state);
    }
}

/// SHA-256 hex digest of raw source bytes.
pub fn fingerprint_bytes(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// RAW GRID
// ============================================================================

/// RawGrid - A rectangular 2-D matrix of string cells with one header row.
///
/// This is the whole inbound contract: whoever fetched the spreadsheet
/// (file reader, HTTP layer, test fixture) hands the normalizer headers plus
/// rows of cells. Rows shorter than the header are padded implicitly by the
/// accessors returning "".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawGrid {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        RawGrid { headers, rows }
    }

    /// Cell accessor tolerant of ragged rows.
    pub fn cell<'a>(&'a self, row: usize, col: usize) -> &'a str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

// ============================================================================
// FETCH SEAM
// ============================================================================

/// GridSource - The seam between the core and whatever supplies raw tables.
///
/// Rendering layers, test fixtures, and file readers all implement this.
/// The core never opens files except through an implementation of it.
pub trait GridSource: Send + Sync {
    /// Fetch the full grid. Blocking read; read fully, release.
    fn fetch(&self) -> Result<RawGrid>;

    /// Descriptor for cache keying. Must reflect current content.
    fn descriptor(&self) -> Result<SourceDescriptor>;
}

/// CsvFileSource - Reads one CSV export from disk.
///
/// The first CSV record is treated as the header row; everything after is
/// data. `flexible(true)` because agency exports routinely have ragged rows.
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        CsvFileSource {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path)
            .with_context(|| format!("Failed to read source file: {}", self.path.display()))
    }
}

impl GridSource for CsvFileSource {
    fn fetch(&self) -> Result<RawGrid> {
        let bytes = self.read_bytes()?;
        parse_csv_grid(&bytes)
            .with_context(|| format!("Failed to parse CSV grid: {}", self.path.display()))
    }

    fn descriptor(&self) -> Result<SourceDescriptor> {
        let bytes = self.read_bytes()?;
        Ok(SourceDescriptor::new(
            self.path.display().to_string(),
            &bytes,
        ))
    }
}

/// Parse raw CSV bytes into a grid. Shared by the file source and tests.
pub fn parse_csv_grid(bytes: &[u8]) -> Result<RawGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV record {}", i + 2))?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }

    Ok(RawGrid::new(headers, rows))
}

// ============================================================================
// TESTS
// ============================================================================
