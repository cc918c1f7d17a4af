use std::path::Path;

use romshelf_core::{ArtifactState, Platform};
use romshelf_db::*;
use romshelf_import::*;
use romshelf_lib::SelectionPolicy;

struct Copies {
    conn: rusqlite::Connection,
    game: i64,
    japan: i64,
    usa: i64,
}

/// Two copies of one game: an unverified Japanese Rev 1 and a verified
/// American Rev 0.
fn copies() -> Copies {
    let conn = open_memory().unwrap();
    upsert_platform(
        &conn,
        &Platform {
            id: "snes".to_string(),
            name: "Super Nintendo".to_string(),
            extensions: vec![],
            dat_source_url: None,
            active_dat_file_id: None,
        },
    )
    .unwrap();
    let library = insert_library(&conn, Path::new("/roms/snes"), "snes", false).unwrap();
    let game = find_or_create_game(&conn, "no-intro", "Quest", "Quest").unwrap();

    let japan = insert_artifact(&conn, library, "Quest (Japan).sfc", 10).unwrap();
    let release = find_or_create_release(&conn, game, Some("Japan"), Some("ja")).unwrap();
    link_artifact(&conn, japan, release, ArtifactState::Matched, false, Some("1")).unwrap();

    let usa = insert_artifact(&conn, library, "Quest (USA).sfc", 10).unwrap();
    let release = find_or_create_release(&conn, game, Some("USA"), Some("en")).unwrap();
    link_artifact(&conn, usa, release, ArtifactState::Matched, true, Some("0")).unwrap();

    Copies {
        conn,
        game,
        japan,
        usa,
    }
}

#[test]
fn verified_region_beats_higher_revision() {
    let c = copies();
    let preview = preview_selection(&c.conn, c.game, &SelectionPolicy::default()).unwrap();

    assert_eq!(preview.selection.winner_id, c.usa);
    assert_eq!(preview.selection.secondary, vec![c.japan]);
    assert_eq!(preview.winner().unwrap().path, "Quest (USA).sfc");
    assert_eq!(preview.candidates.len(), 2);

    // Preview writes nothing.
    assert!(!get_artifact(&c.conn, c.usa).unwrap().unwrap().preferred);
}

#[test]
fn commit_marks_exactly_one_preferred() {
    let c = copies();
    commit_selection(&c.conn, c.game, &SelectionPolicy::default()).unwrap();
    assert!(get_artifact(&c.conn, c.usa).unwrap().unwrap().preferred);
    assert!(!get_artifact(&c.conn, c.japan).unwrap().unwrap().preferred);

    let dupes = duplicate_games(&c.conn, Some("snes")).unwrap();
    assert_eq!(dupes.len(), 1);
    assert_eq!(dupes[0].copies, 2);
    assert_eq!(dupes[0].preferred_artifact_id, Some(c.usa));

    // A policy that only cares about Japan flips the choice.
    let japan_first = SelectionPolicy {
        region_priority: vec!["Japan".to_string()],
        prefer_verified: false,
        prefer_highest_revision: true,
    };
    commit_selection(&c.conn, c.game, &japan_first).unwrap();
    assert!(get_artifact(&c.conn, c.japan).unwrap().unwrap().preferred);
    assert!(!get_artifact(&c.conn, c.usa).unwrap().unwrap().preferred);
}

#[test]
fn unknown_game_and_empty_game_are_rejected() {
    let c = copies();
    let err = preview_selection(&c.conn, 404, &SelectionPolicy::default()).unwrap_err();
    assert!(matches!(err, PipelineError::NotFound { .. }));

    let lonely = find_or_create_game(&c.conn, "no-intro", "Lonely", "Lonely").unwrap();
    let err = preview_selection(&c.conn, lonely, &SelectionPolicy::default()).unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}
