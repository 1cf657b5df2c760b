use async_trait::async_trait;
use doric_core::model::{PendingProgressEntry, StepProgress, UserId};

use super::SqliteRepository;
use super::mapping::{conn, index_to_i64, map_pending_row, value_to_f64};
use crate::repository::{PendingProgressRepository, StorageError};

#[async_trait]
impl PendingProgressRepository for SqliteRepository {
    async fn queue_pending(&self, entry: &PendingProgressEntry) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT OR REPLACE INTO pending_progress (user_id, progress_value, last_step_index, queued_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(entry.user_id().as_str())
        .bind(value_to_f64(entry.progress()))
        .bind(index_to_i64(entry.progress()))
        .bind(entry.queued_at())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_pending(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<PendingProgressEntry>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, progress_value, last_step_index, queued_at
            FROM pending_progress
            WHERE user_id = ?1
            ORDER BY queued_at ASC
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_pending_row).collect()
    }

    async fn delete_pending(&self, user_id: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM pending_progress WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }

    async fn delete_pending_matching(
        &self,
        user_id: &UserId,
        progress: StepProgress,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            DELETE FROM pending_progress
            WHERE user_id = ?1 AND progress_value = ?2 AND last_step_index = ?3
            ",
        )
        .bind(user_id.as_str())
        .bind(value_to_f64(progress))
        .bind(index_to_i64(progress))
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}
