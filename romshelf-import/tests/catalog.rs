use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use romshelf_core::{Job, JobKind, JobStatus, Platform};
use romshelf_dat::SystemExtractor;
use romshelf_db::*;
use romshelf_import::*;
use tempfile::TempDir;

fn catalog(version: &str) -> String {
    format!(
        r#"<datafile>
    <header><name>Sega - Mega Drive</name><author>No-Intro</author><version>{version}</version></header>
    <game name="Alpha (Europe)"><rom name="Alpha (Europe).md" crc="11111111"/></game>
    <game name="Beta (USA)"><rom name="Beta (USA).md" crc="22222222" sha1="2222222222222222222222222222222222222222"/></game>
    <game name="Gamma (Japan)"><rom name="Gamma (Japan).md" crc="33333333"/></game>
</datafile>"#
    )
}

fn setup() -> (rusqlite::Connection, TempDir) {
    let conn = open_memory().unwrap();
    upsert_platform(
        &conn,
        &Platform {
            id: "md".to_string(),
            name: "Mega Drive".to_string(),
            extensions: vec!["md".to_string(), "bin".to_string()],
            dat_source_url: None,
            active_dat_file_id: None,
        },
    )
    .unwrap();
    (conn, TempDir::new().unwrap())
}

fn storage(dir: &TempDir) -> PathBuf {
    dir.path().join("dats").join("md")
}

fn upload(conn: &rusqlite::Connection, dir: &TempDir, name: &str, content: &str) -> Registration {
    let src = dir.path().join(format!("upload-{name}"));
    fs::write(&src, content).unwrap();
    register_dat_file(conn, &storage(dir), "md", &src, name, SOURCE_UPLOAD).unwrap()
}

fn extractor() -> SystemExtractor {
    SystemExtractor::new(Duration::from_secs(30))
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

// ── Registration ────────────────────────────────────────────────────────────

#[test]
fn registration_stores_by_content_hash() {
    let (conn, dir) = setup();
    let reg = upload(&conn, &dir, "md.dat", &catalog("1"));

    assert!(reg.created);
    let file = reg.dat_file;
    assert_eq!(file.filename, "md.dat");
    assert_eq!(file.source, SOURCE_UPLOAD);
    assert_eq!(file.sha256.len(), 64);
    assert_eq!(
        file.storage_path,
        storage(&dir).join(format!("{}.dat", file.sha256))
    );
    assert_eq!(fs::read_to_string(&file.storage_path).unwrap(), catalog("1"));

    let jobs = list_jobs(&conn, Some(JobStatus::Queued), 10).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job, Job::DatImport { dat_file_id: file.id });
}

#[test]
fn identical_upload_is_deduplicated() {
    let (conn, dir) = setup();
    let first = upload(&conn, &dir, "md.dat", &catalog("1"));
    let second = upload(&conn, &dir, "renamed.dat", &catalog("1"));

    assert!(!second.created);
    assert_eq!(second.import_job, None);
    assert_eq!(second.dat_file.id, first.dat_file.id);
    assert_eq!(list_dat_files(&conn, "md").unwrap().len(), 1);
    assert_eq!(job_counts(&conn).unwrap().queued, 1);

    // Only the stored copy is left behind, no temporary files.
    let stored: Vec<_> = fs::read_dir(storage(&dir)).unwrap().collect();
    assert_eq!(stored.len(), 1);
}

#[test]
fn registration_for_unknown_platform_fails() {
    let (conn, dir) = setup();
    let src = dir.path().join("x.dat");
    fs::write(&src, catalog("1")).unwrap();
    let err = register_dat_file(&conn, &storage(&dir), "snes", &src, "x.dat", SOURCE_UPLOAD)
        .unwrap_err();
    assert_eq!(err.disposition(), Disposition::Fatal);
}

#[test]
fn fetch_without_source_url_is_fatal() {
    let (conn, dir) = setup();
    let settings = romshelf_lib::Settings {
        data_dir: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let err = fetch_platform_catalog(&conn, &settings, "md").unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

// ── Import ──────────────────────────────────────────────────────────────────

#[test]
fn import_is_batched_and_idempotent() {
    let (conn, dir) = setup();
    let reg = upload(&conn, &dir, "md.dat", &catalog("7"));
    let id = reg.dat_file.id;

    let stats = import_dat_file(&conn, id, &extractor(), 2, Some(&SilentProgress)).unwrap();
    assert_eq!(stats.entries, 3);
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.source, "no-intro");
    assert_eq!(stats.version.as_deref(), Some("7"));

    import_dat_file(&conn, id, &extractor(), 500, None).unwrap();
    let entries = list_dat_entries(&conn, id).unwrap();
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|e| e.verified && e.source == "no-intro"));
    assert_eq!(
        get_dat_file(&conn, id).unwrap().unwrap().version.as_deref(),
        Some("7")
    );
}

#[test]
fn zipped_catalog_is_unwrapped() {
    let (conn, dir) = setup();
    let zip_path = dir.path().join("md.zip");
    write_zip(&zip_path, &[("Sega - Mega Drive.dat", catalog("2").as_str())]);
    let reg = register_dat_file(&conn, &storage(&dir), "md", &zip_path, "md.zip", SOURCE_UPLOAD)
        .unwrap();
    assert!(reg.dat_file.storage_path.to_string_lossy().ends_with(".zip"));

    let stats = import_dat_file(&conn, reg.dat_file.id, &extractor(), 500, None).unwrap();
    assert_eq!(stats.entries, 3);
    let beta = find_entry_by_hash(
        &conn,
        reg.dat_file.id,
        None,
        Some("2222222222222222222222222222222222222222"),
    )
    .unwrap()
    .unwrap();
    assert_eq!(beta.canonical_name, "Beta (USA).md");
    assert_eq!(beta.region, None);
}

#[test]
fn ambiguous_archive_is_rejected_without_writing() {
    let (conn, dir) = setup();
    let zip_path = dir.path().join("bad.zip");
    write_zip(
        &zip_path,
        &[("readme.txt", "hello"), ("md.dat", catalog("1").as_str())],
    );
    let reg = register_dat_file(&conn, &storage(&dir), "md", &zip_path, "bad.zip", SOURCE_UPLOAD)
        .unwrap();

    let err = import_dat_file(&conn, reg.dat_file.id, &extractor(), 500, None).unwrap_err();
    assert!(matches!(err, PipelineError::Dat(_)));
    assert_eq!(err.disposition(), Disposition::Fatal);
    assert_eq!(count_dat_entries(&conn, reg.dat_file.id).unwrap(), 0);
}

#[test]
fn malformed_document_is_fatal() {
    let (conn, dir) = setup();
    let reg = upload(&conn, &dir, "broken.dat", "<html><body>not a catalog</body></html>");
    let err = import_dat_file(&conn, reg.dat_file.id, &extractor(), 500, None).unwrap_err();
    assert_eq!(err.disposition(), Disposition::Fatal);
}

// ── Activation ──────────────────────────────────────────────────────────────

#[test]
fn activation_queues_one_recheck() {
    let (conn, dir) = setup();
    let a = upload(&conn, &dir, "a.dat", &catalog("1")).dat_file.id;
    let b = upload(&conn, &dir, "b.dat", &catalog("2")).dat_file.id;

    assert!(activate_catalog(&conn, "md", a).unwrap().is_some());
    // A recheck is already pending, so switching again does not add one.
    assert_eq!(activate_catalog(&conn, "md", b).unwrap(), None);

    let platform = get_platform(&conn, "md").unwrap().unwrap();
    assert_eq!(platform.active_dat_file_id, Some(b));
    assert!(get_dat_file(&conn, a).unwrap().unwrap().activated_at.is_none());
    assert!(get_dat_file(&conn, b).unwrap().unwrap().activated_at.is_some());

    assert_eq!(deactivate_catalog(&conn, "md").unwrap(), Some(b));
    assert_eq!(deactivate_catalog(&conn, "md").unwrap(), None);
}

#[test]
fn activation_during_a_running_recheck_queues_another() {
    let (conn, dir) = setup();
    let a = upload(&conn, &dir, "a.dat", &catalog("1")).dat_file.id;
    let b = upload(&conn, &dir, "b.dat", &catalog("2")).dat_file.id;

    activate_catalog(&conn, "md", a).unwrap();
    let running = claim_next(&conn, &[JobKind::DatRecheck], Duration::from_secs(60))
        .unwrap()
        .unwrap();
    assert_eq!(running.status, JobStatus::Running);

    // The running sweep read catalog `a`; `b` still needs its own pass.
    let recheck = activate_catalog(&conn, "md", b).unwrap();
    assert!(recheck.is_some());

    let queued: Vec<_> = list_jobs(&conn, Some(JobStatus::Queued), 50)
        .unwrap()
        .into_iter()
        .filter(|q| q.job.kind() == JobKind::DatRecheck)
        .collect();
    assert_eq!(queued.len(), 1);
    assert_eq!(Some(queued[0].id), recheck);
}

// ── Prune ───────────────────────────────────────────────────────────────────

#[test]
fn prune_keeps_active_and_newest() {
    let (conn, dir) = setup();
    let ids: Vec<i64> = (1..=4)
        .map(|v| {
            let id = upload(&conn, &dir, &format!("v{v}.dat"), &catalog(&v.to_string()))
                .dat_file
                .id;
            import_dat_file(&conn, id, &extractor(), 500, None).unwrap();
            id
        })
        .collect();
    activate_catalog(&conn, "md", ids[0]).unwrap();

    // The oldest is active; of the other three only the newest survives.
    let doomed: Vec<_> = [ids[1], ids[2]]
        .iter()
        .map(|id| get_dat_file(&conn, *id).unwrap().unwrap().storage_path)
        .collect();
    // A stored file that is already gone does not stop the prune.
    fs::remove_file(&doomed[0]).unwrap();

    let stats = prune_dat_files(&conn, 1).unwrap();
    assert_eq!(stats.files_deleted, 2);
    assert_eq!(stats.entries_deleted, 6);
    assert_eq!(stats.errors, 0);

    let remaining: Vec<i64> = list_dat_files(&conn, "md")
        .unwrap()
        .iter()
        .map(|f| f.id)
        .collect();
    assert_eq!(remaining, vec![ids[3], ids[0]]);
    assert!(doomed.iter().all(|p| !p.exists()));
    assert_eq!(count_dat_entries(&conn, ids[1]).unwrap(), 0);
    assert_eq!(count_dat_entries(&conn, ids[0]).unwrap(), 3);
}

#[test]
fn prune_keep_zero_spares_only_the_active_file() {
    let (conn, dir) = setup();
    let active = upload(&conn, &dir, "active.dat", &catalog("1")).dat_file.id;
    let stale = upload(&conn, &dir, "stale.dat", &catalog("2")).dat_file.id;
    activate_catalog(&conn, "md", active).unwrap();

    let stats = prune_dat_files(&conn, 0).unwrap();
    assert_eq!(stats.files_deleted, 1);
    assert!(get_dat_file(&conn, stale).unwrap().is_none());
    assert!(get_dat_file(&conn, active).unwrap().is_some());

    let stats = prune_dat_files(&conn, 0).unwrap();
    assert_eq!(stats, PruneStats::default());
}
