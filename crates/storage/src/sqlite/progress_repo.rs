use async_trait::async_trait;
use chrono::Utc;
use doric_core::model::{ProgressRecord, UserId};

use super::SqliteRepository;
use super::mapping::{conn, index_to_i64, map_progress_row, value_to_f64};
use crate::feed::ProgressSubscription;
use crate::repository::{ProgressRepository, StorageError};

#[async_trait]
impl ProgressRepository for SqliteRepository {
    async fn insert_progress(&self, record: &ProgressRecord) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO progress (user_id, progress_value, last_step_index, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO NOTHING
            ",
        )
        .bind(record.user_id().as_str())
        .bind(value_to_f64(record.progress()))
        .bind(index_to_i64(record.progress()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let inserted = res.rows_affected() > 0;
        if inserted {
            self.feed.publish(record.user_id(), Some(record.clone()));
        }
        Ok(inserted)
    }

    async fn save_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO progress (user_id, progress_value, last_step_index, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                progress_value = excluded.progress_value,
                last_step_index = excluded.last_step_index,
                updated_at = excluded.updated_at
            ",
        )
        .bind(record.user_id().as_str())
        .bind(value_to_f64(record.progress()))
        .bind(index_to_i64(record.progress()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        self.feed.publish(record.user_id(), Some(record.clone()));
        Ok(())
    }

    async fn get_progress(&self, user_id: &UserId) -> Result<Option<ProgressRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, progress_value, last_step_index
            FROM progress WHERE user_id = ?1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn delete_progress(&self, user_id: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM progress WHERE user_id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;

        self.feed.publish(user_id, None);
        Ok(())
    }

    async fn subscribe_progress(
        &self,
        user_id: &UserId,
    ) -> Result<ProgressSubscription, StorageError> {
        let mut subscription = self.feed.subscribe(user_id)?;
        let stored = self.get_progress(user_id).await?;
        self.feed.seed(&mut subscription, stored)?;
        Ok(subscription)
    }
}
