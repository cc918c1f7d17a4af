//! Import a stored catalog file into catalog entries.
//!
//! The document is read (unwrapping a ZIP/7Z container through the injected
//! [`ArchiveExtractor`]), parsed into normalized records, and upserted in
//! fixed-size batches keyed by (catalog file, canonical name). Re-importing
//! the same file overwrites entries rather than accumulating them.

use romshelf_core::{ActivityKind, NewActivity};
use romshelf_dat::{ArchiveExtractor, read_catalog};
use romshelf_db::{append_activity, get_dat_file, set_dat_file_version, upsert_dat_entries};
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;
use crate::progress::ImportProgress;

const MODULE: &str = "datImport";

/// Statistics from a single catalog import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub entries: usize,
    pub batches: usize,
    pub source: String,
    pub version: Option<String>,
}

/// Import catalog file `dat_file_id`.
///
/// A document that cannot be read or parsed aborts the import before any
/// entry is written. A failure between batches leaves the batches already
/// committed in place; re-running the import completes it.
pub fn import_dat_file(
    conn: &Connection,
    dat_file_id: i64,
    extractor: &dyn ArchiveExtractor,
    batch_size: usize,
    progress: Option<&dyn ImportProgress>,
) -> Result<ImportStats, PipelineError> {
    let dat = get_dat_file(conn, dat_file_id)?
        .ok_or_else(|| PipelineError::not_found("dat file", dat_file_id))?;

    if let Some(p) = progress {
        p.on_phase(&format!("Importing {} for {}", dat.filename, dat.platform_id));
    }

    let doc = read_catalog(&dat.storage_path, extractor)?;
    let source = doc.source();
    let total = doc.records.len();
    let mut stats = ImportStats {
        source: source.to_string(),
        version: doc.version.clone(),
        ..Default::default()
    };

    for batch in doc.records.chunks(batch_size.max(1)) {
        stats.entries += upsert_dat_entries(conn, dat.id, &dat.platform_id, source, batch)?;
        stats.batches += 1;
        if let Some(p) = progress {
            p.on_entries(stats.entries, total);
        }
    }

    if let Some(ref version) = doc.version {
        set_dat_file_version(conn, dat.id, version)?;
    }

    let message = format!(
        "Imported {} entries from {} ({})",
        stats.entries, dat.filename, source
    );
    append_activity(
        conn,
        &NewActivity::new(ActivityKind::Import, MODULE, message.clone()).details(json!({
            "datFileId": dat.id,
            "platformId": dat.platform_id,
            "entries": stats.entries,
            "source": source,
            "version": doc.version,
            "name": doc.name,
        })),
    )?;
    if let Some(p) = progress {
        p.on_complete(&message);
    }

    Ok(stats)
}
