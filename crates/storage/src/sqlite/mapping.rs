use doric_core::model::{
    PendingProgressEntry, ProgressRecord, StepProgress, UserId, UserProfile,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn user_id_from_str(raw: String) -> Result<UserId, StorageError> {
    UserId::new(raw).map_err(ser)
}

/// `f32` is widened on write, so narrowing here restores the original value.
#[allow(clippy::cast_possible_truncation)]
fn step_progress_from_row(row: &SqliteRow) -> Result<StepProgress, StorageError> {
    let value: f64 = row.try_get("progress_value").map_err(ser)?;
    let index: i64 = row.try_get("last_step_index").map_err(ser)?;
    let last_step_index = u32::try_from(index)
        .map_err(|_| StorageError::Serialization(format!("invalid last_step_index: {index}")))?;
    Ok(StepProgress::new(value as f32, last_step_index))
}

pub(crate) fn value_to_f64(progress: StepProgress) -> f64 {
    f64::from(progress.value)
}

pub(crate) fn index_to_i64(progress: StepProgress) -> i64 {
    i64::from(progress.last_step_index)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let user_id = user_id_from_str(row.try_get("user_id").map_err(ser)?)?;
    Ok(ProgressRecord::new(user_id, step_progress_from_row(row)?))
}

pub(crate) fn map_pending_row(row: &SqliteRow) -> Result<PendingProgressEntry, StorageError> {
    let user_id = user_id_from_str(row.try_get("user_id").map_err(ser)?)?;
    Ok(PendingProgressEntry::new(
        user_id,
        step_progress_from_row(row)?,
        row.try_get("queued_at").map_err(ser)?,
    ))
}

pub(crate) fn map_user_row(row: &SqliteRow) -> Result<UserProfile, StorageError> {
    let id = user_id_from_str(row.try_get("id").map_err(ser)?)?;
    UserProfile::new(
        id,
        row.try_get::<String, _>("name").map_err(ser)?,
        row.try_get::<String, _>("email").map_err(ser)?,
    )
    .map_err(ser)
}
