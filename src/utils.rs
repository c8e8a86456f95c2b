use std::fs;
use std::path::Path;

use anyhow::{ Context, Result };

/// Read a line-oriented list file, trimming whitespace and skipping blank
/// lines. Used for both the IP list and the user-agent list.
pub fn read_lines(path: &Path) -> Result<Vec<String>> {
    let content = fs
        ::read_to_string(path)
        .context(format!("cannot read {}", path.display()))?;
    Ok(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(ToOwned::to_owned)
            .collect()
    )
}
