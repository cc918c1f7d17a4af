use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use rusqlite::Connection;

use romshelf_db::duplicate_games;
use romshelf_import::{SelectionPreview, commit_selection, preview_selection};
use romshelf_lib::SelectionPolicy;

use super::truncate_str;
use crate::error::CliError;

pub(crate) fn run_dupes_list(conn: &Connection, platform: Option<&str>) -> Result<(), CliError> {
    let games = duplicate_games(conn, platform)?;
    if games.is_empty() {
        log::info!("No duplicates.");
        return Ok(());
    }

    for g in &games {
        log::info!(
            "{:>6}  {} ({} copies, {}){}",
            g.game_id,
            truncate_str(&g.title, 60).if_supports_color(Stdout, |t| t.bold()),
            g.copies,
            g.provider,
            match g.preferred_artifact_id {
                Some(id) => format!(" preferred: {id}"),
                None => format!(
                    " {}",
                    "no preferred copy".if_supports_color(Stdout, |t| t.yellow())
                ),
            },
        );
    }
    log::info!("");
    log::info!("{} game(s) with duplicates", games.len());
    Ok(())
}

fn print_preview(preview: &SelectionPreview) {
    let score_of = |id: i64| {
        preview
            .selection
            .scores
            .iter()
            .find(|(candidate, _)| *candidate == id)
            .map(|(_, score)| *score)
    };

    for c in &preview.candidates {
        let winner = c.artifact_id == preview.selection.winner_id;
        let score = score_of(c.artifact_id)
            .map(|s| format!("{s:>8.3}"))
            .unwrap_or_else(|| "       ?".to_string());
        let line = format!(
            "{} {:>6} {}  {:<8} {:<10} rev {:<6} {}",
            if winner { "\u{2714}" } else { " " },
            c.artifact_id,
            score,
            c.region.as_deref().unwrap_or("-"),
            if c.verified { "verified" } else { "unverified" },
            c.revision.as_deref().unwrap_or("-"),
            c.path,
        );
        if winner {
            log::info!("{}", line.if_supports_color(Stdout, |t| t.green()));
        } else {
            log::info!("{}", line);
        }
    }
}

pub(crate) fn run_dupes_preview(
    conn: &Connection,
    game_id: i64,
    policy: &SelectionPolicy,
) -> Result<(), CliError> {
    let preview = preview_selection(conn, game_id, policy)?;
    log::info!(
        "{}",
        format!(
            "Game {game_id}: {} candidate(s), lower score wins",
            preview.candidates.len()
        )
        .if_supports_color(Stdout, |t| t.bold()),
    );
    print_preview(&preview);
    Ok(())
}

pub(crate) fn run_dupes_apply(
    conn: &Connection,
    game_id: i64,
    policy: &SelectionPolicy,
) -> Result<(), CliError> {
    let preview = commit_selection(conn, game_id, policy)?;
    print_preview(&preview);
    if let Some(winner) = preview.winner() {
        log::info!(
            "Marked {} as preferred",
            winner.path.if_supports_color(Stdout, |t| t.cyan())
        );
    }
    Ok(())
}
