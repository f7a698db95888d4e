//! Draining result cursors into domain records.
//!
//! A mapper is any `FnMut(&ResultRow) -> DbResult<T>`. The drain helpers
//! read a cursor to the end in server order and close it before returning,
//! so the caller can move on to outputs or the next result set.

use crate::db::invoker::{Cursor, PreparedCall};
use crate::db::types::ResultRow;
use crate::error::DbResult;

/// Read every remaining row of `cursor`, then close it.
pub async fn drain_cursor<T, F>(mut cursor: Cursor<'_, '_>, mut map: F) -> DbResult<Vec<T>>
where
    F: FnMut(&ResultRow) -> DbResult<T>,
{
    let mut records = Vec::new();
    while let Some(row) = cursor.next_row().await? {
        records.push(map(&row)?);
    }
    cursor.close().await?;
    Ok(records)
}

/// Drain the cursor produced by `execute`.
///
/// `None` when the call produced no cursor. An empty cursor yields `Some(vec![])`.
pub async fn drain_first<T, F>(call: &mut PreparedCall<'_>, map: F) -> DbResult<Option<Vec<T>>>
where
    F: FnMut(&ResultRow) -> DbResult<T>,
{
    match call.result_set() {
        Some(cursor) => drain_cursor(cursor, map).await.map(Some),
        None => Ok(None),
    }
}

/// Advance to the next cursor and drain it. `None` when there is no further cursor.
pub async fn drain_next<T, F>(call: &mut PreparedCall<'_>, map: F) -> DbResult<Option<Vec<T>>>
where
    F: FnMut(&ResultRow) -> DbResult<T>,
{
    if !call.more_results().await? {
        return Ok(None);
    }
    drain_first(call, map).await
}

/// Close the current cursor without reading it, if one is open.
pub async fn skip_cursor(call: &mut PreparedCall<'_>) -> DbResult<()> {
    match call.result_set() {
        Some(cursor) => cursor.close().await,
        None => Ok(()),
    }
}
