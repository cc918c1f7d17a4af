use std::path::Path;

use romshelf_core::{ArtifactState, CatalogRecord, Platform};
use romshelf_db::*;

struct Fixture {
    conn: rusqlite::Connection,
    library: i64,
    dat: i64,
}

fn setup_db() -> Fixture {
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
    let library = insert_library(&conn, Path::new("/roms/nes"), "nes", false).unwrap();
    let dat = insert_dat_file(
        &conn,
        &NewDatFile {
            platform_id: "nes",
            filename: "nes.dat",
            storage_path: Path::new("/data/nes.dat"),
            size_bytes: 1,
            sha256: "aa",
            source: "upload",
        },
    )
    .unwrap();
    upsert_dat_entries(
        &conn,
        dat,
        "nes",
        "no-intro",
        &[
            CatalogRecord {
                name: "Crc Only (USA)".to_string(),
                crc32: Some("11111111".to_string()),
                sha1: Some("aaaa".to_string()),
                ..Default::default()
            },
            CatalogRecord {
                name: "Sha Match (Europe)".to_string(),
                crc32: Some("22222222".to_string()),
                sha1: Some("bbbb".to_string()),
                ..Default::default()
            },
        ],
    )
    .unwrap();
    Fixture { conn, library, dat }
}

#[test]
fn hash_lookup_prefers_sha1() {
    let f = setup_db();

    let hit = find_entry_by_hash(&f.conn, f.dat, Some("11111111"), Some("bbbb"))
        .unwrap()
        .unwrap();
    assert_eq!(hit.canonical_name, "Sha Match (Europe)");

    let hit = find_entry_by_hash(&f.conn, f.dat, Some("11111111"), Some("ffff"))
        .unwrap()
        .unwrap();
    assert_eq!(hit.canonical_name, "Crc Only (USA)");

    assert!(
        find_entry_by_hash(&f.conn, f.dat, Some("99999999"), Some("ffff"))
            .unwrap()
            .is_none()
    );
    assert!(find_entry_by_hash(&f.conn, f.dat, None, None).unwrap().is_none());
}

#[test]
fn dat_files_list_newest_first() {
    let f = setup_db();
    let newer = insert_dat_file(
        &f.conn,
        &NewDatFile {
            platform_id: "nes",
            filename: "nes-2.dat",
            storage_path: Path::new("/data/nes-2.dat"),
            size_bytes: 1,
            sha256: "bb",
            source: "fetch",
        },
    )
    .unwrap();

    let files = list_dat_files(&f.conn, "nes").unwrap();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].id, newer);
    assert_eq!(
        find_dat_file_by_sha256(&f.conn, "nes", "aa").unwrap().unwrap().id,
        f.dat
    );
    assert!(find_dat_file_by_sha256(&f.conn, "snes", "aa").unwrap().is_none());
    assert_eq!(count_dat_entries(&f.conn, f.dat).unwrap(), 2);
}

#[test]
fn recheck_targets_unlinked_and_fallback_only() {
    let f = setup_db();
    let unhashed = insert_artifact(&f.conn, f.library, "a.nes", 1).unwrap();
    let unlinked = insert_artifact(&f.conn, f.library, "b.nes", 1).unwrap();
    let fallback = insert_artifact(&f.conn, f.library, "c.nes", 1).unwrap();
    let matched = insert_artifact(&f.conn, f.library, "d.nes", 1).unwrap();

    for id in [unlinked, fallback, matched] {
        record_artifact_hashes(&f.conn, id, 1, "00000000", "ffff", None).unwrap();
    }
    let game = find_or_create_game(&f.conn, "file", "ffff", "c").unwrap();
    let release = find_or_create_release(&f.conn, game, None, None).unwrap();
    link_artifact(&f.conn, fallback, release, ArtifactState::Fallback, false, None).unwrap();
    link_artifact(&f.conn, matched, release, ArtifactState::Matched, true, None).unwrap();

    let ids: Vec<i64> = artifacts_for_recheck(&f.conn, "nes")
        .unwrap()
        .into_iter()
        .map(|a| a.id)
        .collect();
    assert_eq!(ids, vec![unlinked, fallback]);
    assert!(!ids.contains(&unhashed));
    assert!(artifacts_for_recheck(&f.conn, "snes").unwrap().is_empty());
}

#[test]
fn state_counts_cover_every_state() {
    let f = setup_db();
    let a = insert_artifact(&f.conn, f.library, "a.nes", 1).unwrap();
    insert_artifact(&f.conn, f.library, "b.nes", 1).unwrap();
    record_artifact_hashes(&f.conn, a, 1, "00000000", "ffff", None).unwrap();

    let counts = artifact_state_counts(&f.conn).unwrap();
    assert_eq!(counts.len(), ArtifactState::ALL.len());
    assert_eq!(
        counts
            .iter()
            .map(|c| (c.state, c.count))
            .collect::<Vec<_>>(),
        vec![
            (ArtifactState::Discovered, 1),
            (ArtifactState::Hashed, 1),
            (ArtifactState::Fallback, 0),
            (ArtifactState::Matched, 0),
        ]
    );
}

#[test]
fn duplicates_and_candidates() {
    let f = setup_db();
    let game = find_or_create_game(&f.conn, "no-intro", "Game", "Game").unwrap();
    let usa = find_or_create_release(&f.conn, game, Some("USA"), None).unwrap();
    let jpn = find_or_create_release(&f.conn, game, Some("Japan"), None).unwrap();
    let lone = find_or_create_game(&f.conn, "no-intro", "Lone", "Lone").unwrap();
    let lone_release = find_or_create_release(&f.conn, lone, None, None).unwrap();

    let a = insert_artifact(&f.conn, f.library, "a.nes", 1).unwrap();
    let b = insert_artifact(&f.conn, f.library, "b.nes", 1).unwrap();
    let c = insert_artifact(&f.conn, f.library, "c.nes", 1).unwrap();
    link_artifact(&f.conn, a, jpn, ArtifactState::Matched, true, Some("1")).unwrap();
    link_artifact(&f.conn, b, usa, ArtifactState::Matched, false, None).unwrap();
    link_artifact(&f.conn, c, lone_release, ArtifactState::Matched, true, None).unwrap();

    let dupes = duplicate_games(&f.conn, None).unwrap();
    assert_eq!(dupes.len(), 1);
    assert_eq!(dupes[0].game_id, game);
    assert_eq!(dupes[0].copies, 2);
    assert_eq!(dupes[0].preferred_artifact_id, None);
    assert!(duplicate_games(&f.conn, Some("snes")).unwrap().is_empty());

    let candidates = selection_candidates(&f.conn, game).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].artifact_id, a);
    assert_eq!(candidates[0].region.as_deref(), Some("Japan"));
    assert_eq!(candidates[0].revision.as_deref(), Some("1"));
    assert_eq!(candidates[1].region.as_deref(), Some("USA"));
    assert!(!candidates[1].verified);

    set_preferred_artifact(&f.conn, game, b).unwrap();
    assert_eq!(
        duplicate_games(&f.conn, Some("nes")).unwrap()[0].preferred_artifact_id,
        Some(b)
    );
}

#[test]
fn find_or_create_game_reuses_identity() {
    let f = setup_db();
    let id = find_or_create_game(&f.conn, "file", "abc", "Title").unwrap();
    assert_eq!(find_or_create_game(&f.conn, "file", "abc", "Other").unwrap(), id);
    assert_ne!(find_or_create_game(&f.conn, "no-intro", "abc", "Title").unwrap(), id);
    let game = get_game(&f.conn, id).unwrap().unwrap();
    assert_eq!(game.title, "Title");
}

#[test]
fn library_listing_and_scan_stamp() {
    let f = setup_db();
    let libs = list_libraries(&f.conn).unwrap();
    assert_eq!(libs.len(), 1);
    assert_eq!(libs[0].id, f.library);
    assert_eq!(libs[0].root, Path::new("/roms/nes"));
    assert!(libs[0].last_scanned_at.is_none());

    mark_library_scanned(&f.conn, f.library).unwrap();
    assert!(
        get_library(&f.conn, f.library)
            .unwrap()
            .unwrap()
            .last_scanned_at
            .is_some()
    );

    delete_library(&f.conn, f.library).unwrap();
    assert!(list_libraries(&f.conn).unwrap().is_empty());
}
