use anyhow::{bail, Result};
use std::env;

use energy_insights::{
    fossil_reduction, CsvFileSource, MetricRegistry, NormalizerConfig, Outcome, ReportConfig,
    ReportError, StoreCache,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        bail!("Usage: energy-insights <export.csv>");
    };

    println!("🌍 Energy Insights v{}", energy_insights::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load and normalize the export
    println!("\n📂 Loading source: {}", path);
    let cache = StoreCache::new();
    let registry = MetricRegistry::new();
    let config = NormalizerConfig::default();
    let source = CsvFileSource::new(path);
    let loaded = cache.load(&source, &registry, &config)?;

    println!("✓ Normalized {} records", loaded.store.len());
    println!(
        "✓ Rows: {} data / {} header / {} structural",
        loaded.report.data_rows, loaded.report.header_rows, loaded.report.structural_rows
    );
    if loaded.report.preamble_rows > 0 {
        println!(
            "⚠ {} data row(s) before the first block header (attributed to default entity)",
            loaded.report.preamble_rows
        );
    }
    if loaded.report.skipped_cells > 0 {
        println!("⚠ Skipped {} unparseable cell(s)", loaded.report.skipped_cells);
    }
    if loaded.report.unrecognized_metrics > 0 {
        println!(
            "⚠ {} row(s) with unrecognized metric labels (kept, flagged)",
            loaded.report.unrecognized_metrics
        );
    }

    log::debug!(
        "Load report: {}",
        serde_json::to_string(&loaded.report).unwrap_or_default()
    );

    // 2. Fossil reduction ranking
    println!("\n📉 Top fossil fuel reducers");
    match fossil_reduction(&loaded.store, &registry, &ReportConfig::new("fossil_reduction")) {
        Ok(report) => {
            println!(
                "   Window: {} → {} ({} entities ranked)",
                report.base_year,
                report.latest_year,
                report.rankings.len()
            );
            for change in report.rankings.iter().take(10) {
                match change.change {
                    Outcome::Value(pct) => println!("   {:>8.2}%  {}", pct, change.entity),
                    Outcome::Undefined => println!("   (undef)   {}", change.entity),
                    Outcome::InsufficientData => {}
                }
            }
        }
        Err(e @ ReportError::MissingRequiredMetric { .. })
        | Err(e @ ReportError::Window(_)) => {
            println!("   Not available for this source: {}", e);
        }
        Err(e) => return Err(e.into()),
    }

    println!("\n✅ Done");
    Ok(())
}
