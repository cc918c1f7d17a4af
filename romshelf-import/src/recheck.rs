//! Re-match a platform's unresolved artifacts after its catalog changed.

use romshelf_core::{ActivityKind, Job, NewActivity};
use romshelf_db::{append_activity, artifacts_for_recheck, get_platform};
use rusqlite::Connection;
use serde_json::json;

use crate::error::PipelineError;
use crate::matcher::match_artifact;

const MODULE: &str = "datRecheck";

/// Counts from one recheck sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecheckStats {
    /// Artifacts examined.
    pub total: usize,
    /// Artifacts that resolved to a catalog entry this time.
    pub matched: usize,
    pub errors: usize,
}

/// Re-run the matcher over every hashed artifact of the platform that has
/// no release or only a fallback one. Catalog-matched artifacts are left
/// alone, so a second sweep with no catalog change matches nothing new.
///
/// Returns `None` without doing anything when the platform has no active
/// catalog.
pub fn recheck_platform(
    conn: &Connection,
    platform_id: &str,
) -> Result<Option<RecheckStats>, PipelineError> {
    let platform = get_platform(conn, platform_id)?
        .ok_or_else(|| PipelineError::not_found("platform", platform_id))?;
    if platform.active_dat_file_id.is_none() {
        log::warn!("Platform {} has no active DAT, skipping recheck", platform_id);
        return Ok(None);
    }

    let artifacts = artifacts_for_recheck(conn, platform_id)?;
    let mut stats = RecheckStats {
        total: artifacts.len(),
        ..Default::default()
    };

    for artifact in &artifacts {
        match match_artifact(conn, artifact, &platform) {
            Ok(outcome) if outcome.is_catalog_match() => stats.matched += 1,
            Ok(_) => {}
            Err(e) => {
                stats.errors += 1;
                log::warn!("Recheck of {} failed: {}", artifact.path, e);
                append_activity(
                    conn,
                    &NewActivity::error(
                        MODULE,
                        format!("{}: {}", artifact.path, e),
                        Job::Hash {
                            artifact_id: artifact.id,
                        },
                    )
                    .details(json!({ "artifactId": artifact.id, "platformId": platform_id })),
                )?;
            }
        }
    }

    append_activity(
        conn,
        &NewActivity::new(
            ActivityKind::Match,
            MODULE,
            format!(
                "DAT recheck matched {} of {} artifacts on {}",
                stats.matched, stats.total, platform.name
            ),
        )
        .details(json!({
            "platformId": platform_id,
            "matched": stats.matched,
            "total": stats.total,
        })),
    )?;
    log::info!(
        "Recheck of {}: {} of {} matched",
        platform_id,
        stats.matched,
        stats.total
    );

    Ok(Some(stats))
}
