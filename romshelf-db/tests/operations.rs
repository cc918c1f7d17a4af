use std::path::Path;

use romshelf_core::{ArtifactState, CatalogRecord, Platform};
use romshelf_db::*;

fn test_platform() -> Platform {
    Platform {
        id: "nes".to_string(),
        name: "Nintendo Entertainment System".to_string(),
        extensions: vec!["nes".to_string(), "zip".to_string()],
        dat_source_url: None,
        active_dat_file_id: None,
    }
}

fn add_dat_file(conn: &rusqlite::Connection, platform_id: &str, sha256: &str) -> i64 {
    insert_dat_file(
        conn,
        &NewDatFile {
            platform_id,
            filename: "nes.dat",
            storage_path: Path::new("/data/dats/nes/x.dat"),
            size_bytes: 123,
            sha256,
            source: "upload",
        },
    )
    .unwrap()
}

fn record(name: &str, crc32: &str) -> CatalogRecord {
    CatalogRecord {
        name: name.to_string(),
        crc32: Some(crc32.to_string()),
        region: Some("USA".to_string()),
        languages: vec!["en".to_string()],
        ..Default::default()
    }
}

#[test]
fn upsert_platform_keeps_active_catalog() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let dat = add_dat_file(&conn, "nes", "aa");
    activate_dat_file(&conn, "nes", dat).unwrap();

    let mut renamed = test_platform();
    renamed.name = "Famicom".to_string();
    upsert_platform(&conn, &renamed).unwrap();

    let platform = get_platform(&conn, "nes").unwrap().unwrap();
    assert_eq!(platform.name, "Famicom");
    assert_eq!(platform.extensions, vec!["nes", "zip"]);
    assert_eq!(platform.active_dat_file_id, Some(dat));
}

#[test]
fn library_requires_known_platform() {
    let conn = open_memory().unwrap();
    let err = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap_err();
    assert!(matches!(err, OperationError::NotFound { .. }));
}

#[test]
fn library_root_is_unique() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();
    assert!(insert_library(&conn, Path::new("/roms/nes"), "nes", true).is_err());
}

#[test]
fn activation_moves_between_files() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let first = add_dat_file(&conn, "nes", "aa");
    let second = add_dat_file(&conn, "nes", "bb");

    activate_dat_file(&conn, "nes", first).unwrap();
    activate_dat_file(&conn, "nes", second).unwrap();

    assert!(get_dat_file(&conn, first).unwrap().unwrap().activated_at.is_none());
    assert!(get_dat_file(&conn, second).unwrap().unwrap().activated_at.is_some());
    assert_eq!(
        get_platform(&conn, "nes").unwrap().unwrap().active_dat_file_id,
        Some(second)
    );
}

#[test]
fn activation_rejects_foreign_catalog() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let mut snes = test_platform();
    snes.id = "snes".to_string();
    upsert_platform(&conn, &snes).unwrap();
    let dat = add_dat_file(&conn, "snes", "aa");

    let err = activate_dat_file(&conn, "nes", dat).unwrap_err();
    assert!(matches!(err, OperationError::Invalid(_)));
    assert_eq!(
        get_platform(&conn, "nes").unwrap().unwrap().active_dat_file_id,
        None
    );
}

#[test]
fn deactivation_clears_both_sides() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let dat = add_dat_file(&conn, "nes", "aa");

    assert_eq!(deactivate_dat_file(&conn, "nes").unwrap(), None);

    activate_dat_file(&conn, "nes", dat).unwrap();
    assert_eq!(deactivate_dat_file(&conn, "nes").unwrap(), Some(dat));
    assert!(get_dat_file(&conn, dat).unwrap().unwrap().activated_at.is_none());
    assert_eq!(
        get_platform(&conn, "nes").unwrap().unwrap().active_dat_file_id,
        None
    );
}

#[test]
fn active_catalog_cannot_be_deleted() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let dat = add_dat_file(&conn, "nes", "aa");
    upsert_dat_entries(&conn, dat, "nes", "no-intro", &[record("A", "00000001")]).unwrap();
    activate_dat_file(&conn, "nes", dat).unwrap();

    assert!(matches!(
        delete_dat_file(&conn, dat).unwrap_err(),
        OperationError::Invalid(_)
    ));

    deactivate_dat_file(&conn, "nes").unwrap();
    assert_eq!(delete_dat_file(&conn, dat).unwrap(), 1);
    assert!(get_dat_file(&conn, dat).unwrap().is_none());
}

#[test]
fn reimport_overwrites_entries() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let dat = add_dat_file(&conn, "nes", "aa");

    upsert_dat_entries(
        &conn,
        dat,
        "nes",
        "unknown",
        &[record("Game A", "00000001"), record("Game B", "00000002")],
    )
    .unwrap();
    upsert_dat_entries(&conn, dat, "nes", "no-intro", &[record("Game A", "0000000f")]).unwrap();

    let entries = list_dat_entries(&conn, dat).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].canonical_name, "Game A");
    assert_eq!(entries[0].crc32.as_deref(), Some("0000000f"));
    assert_eq!(entries[0].source, "no-intro");
    assert_eq!(entries[0].languages, vec!["en"]);
    assert!(entries[0].verified);
}

#[test]
fn release_reuse_treats_missing_fields_as_a_key() {
    let conn = open_memory().unwrap();
    let game = find_or_create_game(&conn, "file", "abc", "Thing").unwrap();
    assert_eq!(
        find_or_create_game(&conn, "file", "abc", "Other title").unwrap(),
        game
    );

    let bare = find_or_create_release(&conn, game, None, None).unwrap();
    assert_eq!(find_or_create_release(&conn, game, None, None).unwrap(), bare);

    let usa = find_or_create_release(&conn, game, Some("USA"), Some("en")).unwrap();
    assert_ne!(usa, bare);
    assert_eq!(
        find_or_create_release(&conn, game, Some("USA"), Some("en")).unwrap(),
        usa
    );
    assert_ne!(
        find_or_create_release(&conn, game, Some("USA"), None).unwrap(),
        usa
    );
}

#[test]
fn artifact_lifecycle() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let lib = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();

    let id = insert_artifact(&conn, lib, "Game.nes", 10).unwrap();
    assert_eq!(insert_artifact(&conn, lib, "Game.nes", 10).unwrap(), id);
    assert_eq!(
        get_artifact(&conn, id).unwrap().unwrap().state,
        ArtifactState::Discovered
    );

    record_artifact_hashes(&conn, id, 10, "a0f95d33", "65ea", Some("nes")).unwrap();
    let artifact = get_artifact(&conn, id).unwrap().unwrap();
    assert_eq!(artifact.state, ArtifactState::Hashed);
    assert_eq!(artifact.format.as_deref(), Some("nes"));

    let game = find_or_create_game(&conn, "file", "65ea", "Game").unwrap();
    let release = find_or_create_release(&conn, game, None, None).unwrap();
    link_artifact(&conn, id, release, ArtifactState::Fallback, false, None).unwrap();
    assert_eq!(
        get_artifact(&conn, id).unwrap().unwrap().release_id,
        Some(release)
    );

    reset_artifact(&conn, id, 20).unwrap();
    let artifact = get_artifact(&conn, id).unwrap().unwrap();
    assert_eq!(artifact.state, ArtifactState::Discovered);
    assert_eq!(artifact.size_bytes, 20);
    assert!(artifact.sha1.is_none());
    assert!(artifact.release_id.is_none());
}

#[test]
fn orphaned_release_takes_its_game_along() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let lib = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();
    let id = insert_artifact(&conn, lib, "Game.nes", 10).unwrap();

    let game = find_or_create_game(&conn, "file", "65ea", "Game").unwrap();
    let release = find_or_create_release(&conn, game, None, None).unwrap();
    link_artifact(&conn, id, release, ArtifactState::Fallback, false, None).unwrap();

    assert!(!delete_release_if_orphaned(&conn, release).unwrap());

    let other_game = find_or_create_game(&conn, "no-intro", "Game (USA)", "Game (USA)").unwrap();
    let other = find_or_create_release(&conn, other_game, Some("USA"), None).unwrap();
    link_artifact(&conn, id, other, ArtifactState::Matched, true, None).unwrap();

    assert!(delete_release_if_orphaned(&conn, release).unwrap());
    assert!(get_release(&conn, release).unwrap().is_none());
    assert!(get_game(&conn, game).unwrap().is_none());
}

#[test]
fn group_stamp_only_hits_existing_artifacts() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let lib = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();
    let id = insert_artifact(&conn, lib, "disc/track01.bin", 10).unwrap();

    assert!(set_artifact_group(&conn, lib, "disc/track01.bin", "Disc").unwrap());
    assert!(!set_artifact_group(&conn, lib, "disc/track02.bin", "Disc").unwrap());
    assert_eq!(
        get_artifact(&conn, id).unwrap().unwrap().group_id.as_deref(),
        Some("Disc")
    );
}

#[test]
fn preferred_flag_has_one_winner_per_game() {
    let conn = open_memory().unwrap();
    upsert_platform(&conn, &test_platform()).unwrap();
    let lib = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();
    let game = find_or_create_game(&conn, "no-intro", "Game", "Game").unwrap();
    let usa = find_or_create_release(&conn, game, Some("USA"), None).unwrap();
    let eur = find_or_create_release(&conn, game, Some("Europe"), None).unwrap();

    let a = insert_artifact(&conn, lib, "a.nes", 1).unwrap();
    let b = insert_artifact(&conn, lib, "b.nes", 1).unwrap();
    link_artifact(&conn, a, usa, ArtifactState::Matched, true, None).unwrap();
    link_artifact(&conn, b, eur, ArtifactState::Matched, true, None).unwrap();

    set_preferred_artifact(&conn, game, a).unwrap();
    set_preferred_artifact(&conn, game, b).unwrap();

    assert!(!get_artifact(&conn, a).unwrap().unwrap().preferred);
    assert!(get_artifact(&conn, b).unwrap().unwrap().preferred);

    let stranger = insert_artifact(&conn, lib, "c.nes", 1).unwrap();
    assert!(matches!(
        set_preferred_artifact(&conn, game, stranger).unwrap_err(),
        OperationError::Invalid(_)
    ));
}
