pub(crate) mod activity;
pub(crate) mod config;
pub(crate) mod dat;
pub(crate) mod dupes;
pub(crate) mod jobs;
pub(crate) mod library;
pub(crate) mod platform;
pub(crate) mod status;
pub(crate) mod worker;

use romshelf_lib::Settings;
use rusqlite::Connection;

use crate::error::CliError;

/// Open (creating if needed) the database named by the settings.
pub(crate) fn open_db(settings: &Settings) -> Result<Connection, CliError> {
    let path = settings.database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    log::debug!("Using database {}", path.display());
    Ok(romshelf_db::open_database(&path)?)
}

/// Truncate a string to a maximum width, appending "..." if needed.
pub(crate) fn truncate_str(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else if max > 3 {
        let kept: String = s.chars().take(max - 3).collect();
        format!("{kept}...")
    } else {
        s.chars().take(max).collect()
    }
}

/// Format a byte count in human-readable form.
pub(crate) fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
