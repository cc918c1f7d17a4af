//! Catalog file lifecycle: registration, download, activation.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use romshelf_core::{ActivityKind, CatalogFile, Job, NewActivity, normalize_extension};
use romshelf_dat::fetch_catalog;
use romshelf_db::{
    NewDatFile, activate_dat_file, append_activity, deactivate_dat_file, enqueue,
    enqueue_unique_queued, find_dat_file_by_sha256, get_dat_file, get_platform, insert_dat_file,
};
use romshelf_lib::{Settings, sha256_reader};
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;

const MODULE: &str = "dat";

/// Provenance of a catalog added from a local file.
pub const SOURCE_UPLOAD: &str = "upload";
/// Provenance of a catalog downloaded from a platform's source URL.
pub const SOURCE_FETCH: &str = "fetch";

/// Outcome of registering a catalog file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub dat_file: CatalogFile,
    /// False when identical content was already stored for the platform.
    pub created: bool,
    /// Import job queued for a newly created file.
    pub import_job: Option<i64>,
}

static INCOMING: AtomicU64 = AtomicU64::new(0);

/// Copies everything read through it into `sink`.
struct TeeReader<R, W> {
    inner: R,
    sink: W,
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.sink.write_all(&buf[..n])?;
        Ok(n)
    }
}

/// Copy `file` into `storage_dir` as `<sha256>.<ext>` and record it.
///
/// The content hash is computed while copying. If the platform already has
/// a catalog file with the same hash, that file is returned and nothing new
/// is stored or queued. Otherwise a row is created and an import queued.
pub fn register_dat_file(
    conn: &Connection,
    storage_dir: &Path,
    platform_id: &str,
    file: &Path,
    filename: &str,
    source: &str,
) -> Result<Registration, PipelineError> {
    if get_platform(conn, platform_id)?.is_none() {
        return Err(PipelineError::not_found("platform", platform_id));
    }

    fs::create_dir_all(storage_dir)?;
    let tmp = storage_dir.join(format!(
        ".incoming-{}-{}",
        std::process::id(),
        INCOMING.fetch_add(1, Ordering::Relaxed)
    ));
    let hashed = copy_hashing(file, &tmp);
    let (sha256, size) = match hashed {
        Ok(v) => v,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
    };

    if let Some(existing) = find_dat_file_by_sha256(conn, platform_id, &sha256)? {
        let _ = fs::remove_file(&tmp);
        log::info!(
            "{} is already stored as dat file {} for {}",
            filename,
            existing.id,
            platform_id
        );
        return Ok(Registration {
            dat_file: existing,
            created: false,
            import_job: None,
        });
    }

    let ext = Path::new(filename)
        .extension()
        .map(|e| normalize_extension(&e.to_string_lossy()))
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "dat".to_string());
    let stored = storage_dir.join(format!("{sha256}.{ext}"));
    fs::rename(&tmp, &stored)?;

    let id = insert_dat_file(
        conn,
        &NewDatFile {
            platform_id,
            filename,
            storage_path: &stored,
            size_bytes: size,
            sha256: &sha256,
            source,
        },
    )?;
    let import_job = enqueue(conn, &Job::DatImport { dat_file_id: id })?;

    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Import,
            MODULE,
            format!("Registered {} for {}", filename, platform_id),
        )
        .details(json!({
            "datFileId": id,
            "platformId": platform_id,
            "sha256": sha256,
            "sizeBytes": size,
            "source": source,
        })),
    )?;

    let dat_file =
        get_dat_file(conn, id)?.ok_or_else(|| PipelineError::not_found("dat file", id))?;
    Ok(Registration {
        dat_file,
        created: true,
        import_job: Some(import_job),
    })
}

fn copy_hashing(src: &Path, dest: &Path) -> io::Result<(String, u64)> {
    let mut tee = TeeReader {
        inner: File::open(src)?,
        sink: File::create(dest)?,
    };
    let digest = sha256_reader(&mut tee)?;
    tee.sink.sync_all()?;
    Ok(digest)
}

/// Download a platform's catalog from its source URL and register it.
pub fn fetch_platform_catalog(
    conn: &Connection,
    settings: &Settings,
    platform_id: &str,
) -> Result<Registration, PipelineError> {
    let platform = get_platform(conn, platform_id)?
        .ok_or_else(|| PipelineError::not_found("platform", platform_id))?;
    let url = platform.dat_source_url.as_deref().ok_or_else(|| {
        PipelineError::validation(format!("platform '{platform_id}' has no DAT source URL"))
    })?;

    let storage_dir = settings.dat_storage_dir(platform_id);
    let download = fetch_catalog(url, &storage_dir, settings.dat.fetch_timeout())?;
    let result = register_dat_file(
        conn,
        &storage_dir,
        platform_id,
        &download.path,
        &download.filename,
        SOURCE_FETCH,
    );
    let _ = fs::remove_file(&download.path);
    result
}

/// Make a catalog file active for its platform and queue a recheck.
///
/// Returns the recheck job ID, or `None` if one was already waiting to be
/// claimed. A recheck that is already running does not count, since it
/// started against the previous catalog.
pub fn activate_catalog(
    conn: &Connection,
    platform_id: &str,
    dat_file_id: i64,
) -> Result<Option<i64>, PipelineError> {
    activate_dat_file(conn, platform_id, dat_file_id)?;
    let job = enqueue_unique_queued(
        conn,
        &Job::DatRecheck {
            platform_id: platform_id.to_string(),
        },
    )?;

    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Import,
            MODULE,
            format!("Activated dat file {} for {}", dat_file_id, platform_id),
        )
        .details(json!({ "datFileId": dat_file_id, "platformId": platform_id })),
    )?;
    log::info!("Activated dat file {} for {}", dat_file_id, platform_id);
    Ok(job)
}

/// Clear a platform's active catalog. Returns the file that was active.
pub fn deactivate_catalog(
    conn: &Connection,
    platform_id: &str,
) -> Result<Option<i64>, PipelineError> {
    let previous = deactivate_dat_file(conn, platform_id)?;
    if let Some(id) = previous {
        append_activity(
            conn,
            &NewActivity::new(
                ActivityKind::Import,
                MODULE,
                format!("Deactivated dat file {} for {}", id, platform_id),
            )
            .details(json!({ "datFileId": id, "platformId": platform_id })),
        )?;
    }
    Ok(previous)
}
