//! Pick and persist the preferred copy of a duplicated game.

use romshelf_db::{CandidateRow, get_game, selection_candidates, set_preferred_artifact};
use romshelf_lib::{Candidate, Selection, SelectionPolicy, parse_revision, select};
use rusqlite::Connection;

use crate::error::PipelineError;

/// Winner and per-copy scores for one game, without writing anything.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPreview {
    pub game_id: i64,
    pub selection: Selection,
    /// The linked copies, in the order they were scored.
    pub candidates: Vec<CandidateRow>,
}

impl SelectionPreview {
    pub fn winner(&self) -> Option<&CandidateRow> {
        self.candidates
            .iter()
            .find(|c| c.artifact_id == self.selection.winner_id)
    }
}

fn to_candidate(row: &CandidateRow) -> Candidate {
    Candidate {
        artifact_id: row.artifact_id,
        region: row.region.clone(),
        verified: row.verified,
        revision: row.revision.as_deref().and_then(parse_revision),
    }
}

/// Score every linked copy of `game_id` under `policy`.
pub fn preview_selection(
    conn: &Connection,
    game_id: i64,
    policy: &SelectionPolicy,
) -> Result<SelectionPreview, PipelineError> {
    if get_game(conn, game_id)?.is_none() {
        return Err(PipelineError::not_found("game", game_id));
    }
    let candidates = selection_candidates(conn, game_id)?;
    let scored: Vec<Candidate> = candidates.iter().map(to_candidate).collect();
    let selection = select(&scored, policy).ok_or_else(|| {
        PipelineError::validation(format!("game {game_id} has no linked artifacts"))
    })?;

    Ok(SelectionPreview {
        game_id,
        selection,
        candidates,
    })
}

/// Run the selection and mark the winner preferred, clearing the flag on
/// every other copy in the same transaction.
pub fn commit_selection(
    conn: &Connection,
    game_id: i64,
    policy: &SelectionPolicy,
) -> Result<SelectionPreview, PipelineError> {
    let preview = preview_selection(conn, game_id, policy)?;
    set_preferred_artifact(conn, game_id, preview.selection.winner_id)?;
    log::info!(
        "Game {}: artifact {} is now preferred",
        game_id,
        preview.selection.winner_id
    );
    Ok(preview)
}
