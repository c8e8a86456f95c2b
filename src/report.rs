use std::fs;
use std::path::Path;

use anyhow::{ Context, Result };
use tracing::info;

use crate::result::LookupResult;

const CSV_COLUMNS: [&str; 5] = ["ip", "score", "risk", "error", "raw_json"];

/// Write the tabular report: fixed column set, one row per result, in
/// collection order. Missing parent directories are created.
pub fn write_report(path: &Path, results: &[LookupResult]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs
                ::create_dir_all(parent)
                .context(format!("cannot create output directory {}", parent.display()))?;
        }
    }
    let mut writer = csv::Writer
        ::from_path(path)
        .context(format!("cannot create report file {}", path.display()))?;
    writer.write_record(CSV_COLUMNS)?;
    for r in results {
        let raw_json = r.raw_json();
        writer.write_record([
            r.ip.as_str(),
            r.score.as_deref().unwrap_or(""),
            r.risk.as_deref().unwrap_or(""),
            r.error.as_deref().unwrap_or(""),
            raw_json.as_str(),
        ])?;
    }
    writer.flush().context("cannot flush report file")?;
    info!("wrote {} records to {}", results.len(), path.display());
    Ok(())
}
