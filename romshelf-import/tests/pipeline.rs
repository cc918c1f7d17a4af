use std::fs;
use std::path::Path;

use romshelf_core::{ActivityKind, ArtifactState, Job, JobStatus, Platform};
use romshelf_db::*;
use romshelf_import::*;
use romshelf_lib::Settings;
use tempfile::TempDir;

const ABC_SHA1: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

const NES_DAT: &str = r#"<?xml version="1.0"?>
<datafile>
    <header>
        <name>Nintendo - Nintendo Entertainment System</name>
        <author>No-Intro</author>
        <version>20240101</version>
    </header>
    <game name="Abc Quest (USA)" region="USA">
        <rom name="Abc Quest (USA).nes" size="3" crc="352441C2" sha1="A9993E364706816ABA3E25717850C26C9CD0D89D"/>
    </game>
    <game name="Missing (Japan)" region="Japan">
        <rom name="Missing (Japan).nes" size="4" crc="deadbeef"/>
    </game>
</datafile>
"#;

struct Fixture {
    conn: rusqlite::Connection,
    data: TempDir,
    roms: TempDir,
    pipeline: Pipeline,
}

fn fixture() -> Fixture {
    let data = TempDir::new().unwrap();
    let roms = TempDir::new().unwrap();
    let settings = Settings {
        data_dir: Some(data.path().to_path_buf()),
        ..Default::default()
    };
    let conn = open_memory().unwrap();
    upsert_platform(
        &conn,
        &Platform {
            id: "nes".to_string(),
            name: "NES".to_string(),
            extensions: vec!["nes".to_string()],
            dat_source_url: None,
            active_dat_file_id: None,
        },
    )
    .unwrap();
    Fixture {
        conn,
        data,
        roms,
        pipeline: Pipeline::new(settings),
    }
}

fn write(dir: &Path, rel: &str, content: &[u8]) {
    fs::write(dir.join(rel), content).unwrap();
}

fn register(fx: &Fixture) -> Registration {
    let upload = fx.data.path().join("upload.dat");
    fs::write(&upload, NES_DAT).unwrap();
    register_dat_file(
        &fx.conn,
        &fx.pipeline.settings().dat_storage_dir("nes"),
        "nes",
        &upload,
        "nes.dat",
        SOURCE_UPLOAD,
    )
    .unwrap()
}

fn artifact(conn: &rusqlite::Connection, library: i64, rel: &str) -> romshelf_core::Artifact {
    find_artifact(conn, library, rel).unwrap().unwrap()
}

#[test]
fn scan_hash_activate_recheck() {
    let fx = fixture();
    let conn = &fx.conn;

    // Register and import the catalog.
    let reg = register(&fx);
    assert!(reg.created);
    assert!(reg.import_job.is_some());
    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 1);
    let dat = get_dat_file(conn, reg.dat_file.id).unwrap().unwrap();
    assert_eq!(dat.version.as_deref(), Some("20240101"));
    assert_eq!(count_dat_entries(conn, dat.id).unwrap(), 2);

    // Scan the library; every file is hashed but nothing is active yet.
    write(fx.roms.path(), "Abc Quest.nes", b"abc");
    write(fx.roms.path(), "Homebrew.nes", b"homebrew");
    write(fx.roms.path(), "notes.txt", b"not a rom");
    let library = insert_library(conn, fx.roms.path(), "nes", false).unwrap();
    enqueue(conn, &Job::Scan { library_id: library }).unwrap();
    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 3);

    let abc = artifact(conn, library, "Abc Quest.nes");
    assert_eq!(abc.state, ArtifactState::Fallback);
    let fallback_release = get_release(conn, abc.release_id.unwrap()).unwrap().unwrap();
    let fallback_game = get_game(conn, fallback_release.game_id).unwrap().unwrap();
    assert_eq!(fallback_game.provider, FALLBACK_PROVIDER);
    assert_eq!(fallback_game.provider_id, ABC_SHA1);
    assert_eq!(
        artifact(conn, library, "Homebrew.nes").state,
        ArtifactState::Fallback
    );

    // Activation queues a recheck that upgrades the catalog hit.
    let recheck = activate_catalog(conn, "nes", dat.id).unwrap();
    assert!(recheck.is_some());
    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 1);

    let abc = artifact(conn, library, "Abc Quest.nes");
    assert_eq!(abc.state, ArtifactState::Matched);
    assert!(abc.verified);
    let release = get_release(conn, abc.release_id.unwrap()).unwrap().unwrap();
    assert_eq!(release.region.as_deref(), Some("USA"));
    let game = get_game(conn, release.game_id).unwrap().unwrap();
    assert_eq!(game.provider, "no-intro");
    assert_eq!(game.title, "Abc Quest (USA).nes");
    // The fallback identity it used to hold is gone.
    assert!(get_game(conn, fallback_game.id).unwrap().is_none());

    // Nothing changed in the catalog, so a second sweep upgrades nothing.
    let second = recheck_platform(conn, "nes").unwrap().unwrap();
    assert_eq!(second.total, 1);
    assert_eq!(second.matched, 0);

    let counts = artifact_state_counts(conn).unwrap();
    let count = |state| counts.iter().find(|c| c.state == state).unwrap().count;
    assert_eq!(count(ArtifactState::Matched), 1);
    assert_eq!(count(ArtifactState::Fallback), 1);
    assert_eq!(count(ArtifactState::Discovered), 0);

    let rechecks = list_activity(
        conn,
        &ActivityFilter {
            module: Some("datRecheck".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(rechecks.len(), 2);
    assert_eq!(rechecks[1].message, "DAT recheck matched 1 of 2 artifacts on NES");
}

#[test]
fn recheck_without_active_catalog_is_a_noop() {
    let fx = fixture();
    assert_eq!(recheck_platform(&fx.conn, "nes").unwrap(), None);
}

#[test]
fn fatal_failure_leaves_a_retryable_activity() {
    let fx = fixture();
    let conn = &fx.conn;
    let job_id = enqueue(conn, &Job::Hash { artifact_id: 999 }).unwrap();

    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 1);

    let failed = list_jobs(conn, Some(JobStatus::Failed), 10).unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, job_id);
    assert_eq!(failed[0].attempts, 1);
    assert!(failed[0].last_error.as_deref().unwrap().contains("999"));

    let errors = list_activity(
        conn,
        &ActivityFilter {
            kind: Some(ActivityKind::Error),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].module, "hash");
    assert_eq!(errors[0].retry, Some(Job::Hash { artifact_id: 999 }));
    assert_eq!(errors[0].details["retryable"], false);

    // Retrying the activity re-enqueues the job and acknowledges the entry.
    let retried = retry_activity(conn, errors[0].id).unwrap();
    assert_ne!(retried, job_id);
    assert_eq!(job_counts(conn).unwrap().queued, 1);
    assert!(get_activity(conn, errors[0].id).unwrap().is_none());
}

#[test]
fn transient_failure_is_rescheduled() {
    let fx = fixture();
    let conn = &fx.conn;
    let library = insert_library(conn, fx.roms.path(), "nes", false).unwrap();
    let id = insert_artifact(conn, library, "vanished.nes", 3).unwrap();
    enqueue(conn, &Job::Hash { artifact_id: id }).unwrap();

    // The retry is delayed, so only one attempt runs now.
    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 1);

    let queued = list_jobs(conn, Some(JobStatus::Queued), 10).unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].attempts, 1);
    assert!(queued[0].last_error.is_some());
    assert!(queued[0].run_after > now());
    assert_eq!(job_counts(conn).unwrap().failed, 0);
}

#[test]
fn kind_filter_leaves_other_jobs_queued() {
    let fx = fixture();
    let conn = &fx.conn;
    let library = insert_library(conn, fx.roms.path(), "nes", false).unwrap();
    write(fx.roms.path(), "a.nes", b"abc");
    enqueue(conn, &Job::Scan { library_id: library }).unwrap();

    assert_eq!(
        fx.pipeline
            .run_pending(conn, &[romshelf_core::JobKind::Scan])
            .unwrap(),
        1
    );
    let counts = job_counts(conn).unwrap();
    assert_eq!(counts.done, 1);
    assert_eq!(counts.queued, 1);
}

#[test]
fn prune_job_uses_configured_default() {
    let fx = fixture();
    let conn = &fx.conn;
    enqueue(conn, &Job::DatPrune { keep_count: None }).unwrap();
    assert_eq!(fx.pipeline.run_pending(conn, &[]).unwrap(), 1);

    let entries = list_activity(
        conn,
        &ActivityFilter {
            module: Some("datPrune".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].details["keep"], 3);
}
