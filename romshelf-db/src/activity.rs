//! Append-only audit trail of pipeline events.

use romshelf_core::{ActivityEntry, ActivityKind, NewActivity};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::jobs::enqueue;
use crate::now;
use crate::operations::OperationError;
use crate::queries::{json_column, parse_column};

const ACTIVITY_COLUMNS: &str = "id, timestamp, kind, module, message, details, retry";

/// Filter and page for [`list_activity`].
#[derive(Debug, Clone)]
pub struct ActivityFilter {
    pub offset: usize,
    pub limit: usize,
    pub kind: Option<ActivityKind>,
    pub module: Option<String>,
}

impl Default for ActivityFilter {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
            kind: None,
            module: None,
        }
    }
}

/// Store an activity entry. Returns its ID.
pub fn append_activity(conn: &Connection, entry: &NewActivity) -> Result<i64, OperationError> {
    let details = serde_json::to_string(&entry.details)?;
    let retry = entry.retry.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO activity (timestamp, kind, module, message, details, retry)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            now(),
            entry.kind.as_str(),
            entry.module,
            entry.message,
            details,
            retry,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Entries matching the filter, newest first.
pub fn list_activity(
    conn: &Connection,
    filter: &ActivityFilter,
) -> Result<Vec<ActivityEntry>, OperationError> {
    let sql = format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activity
         WHERE (?1 IS NULL OR kind = ?1) AND (?2 IS NULL OR module = ?2)
         ORDER BY timestamp DESC, id DESC
         LIMIT ?3 OFFSET ?4"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            filter.kind.map(|k| k.as_str()),
            filter.module,
            filter.limit as i64,
            filter.offset as i64,
        ],
        row_to_activity,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn get_activity(conn: &Connection, id: i64) -> Result<Option<ActivityEntry>, OperationError> {
    let sql = format!("SELECT {ACTIVITY_COLUMNS} FROM activity WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_activity)
        .optional()
        .map_err(Into::into)
}

/// Acknowledge (delete) an entry.
pub fn remove_activity(conn: &Connection, id: i64) -> Result<(), OperationError> {
    let changed = conn.execute("DELETE FROM activity WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(OperationError::not_found("activity", id));
    }
    Ok(())
}

/// Re-enqueue an error entry's retry job and remove the entry, in one
/// transaction. Returns the new job ID.
pub fn retry_activity(conn: &Connection, id: i64) -> Result<i64, OperationError> {
    let tx = conn.unchecked_transaction()?;

    let entry = get_activity(&tx, id)?.ok_or_else(|| OperationError::not_found("activity", id))?;
    let job = entry
        .retry
        .ok_or_else(|| OperationError::invalid(format!("activity {id} has no retry job")))?;

    let job_id = enqueue(&tx, &job)?;
    tx.execute("DELETE FROM activity WHERE id = ?1", params![id])?;

    tx.commit()?;
    log::info!("Re-enqueued {} from activity {} as job {}", job, id, job_id);
    Ok(job_id)
}

fn row_to_activity(row: &Row) -> rusqlite::Result<ActivityEntry> {
    let kind: String = row.get(2)?;
    let details: String = row.get(5)?;
    let retry: Option<String> = row.get(6)?;
    Ok(ActivityEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        kind: parse_column(2, kind)?,
        module: row.get(3)?,
        message: row.get(4)?,
        details: json_column(5, &details)?,
        retry: retry.map(|r| json_column(6, &r)).transpose()?,
    })
}
