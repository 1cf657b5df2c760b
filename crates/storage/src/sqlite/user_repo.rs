use async_trait::async_trait;
use doric_core::model::{UserId, UserProfile};

use super::SqliteRepository;
use super::mapping::{conn, map_user_row};
use crate::repository::{StorageError, UserRepository};

#[async_trait]
impl UserRepository for SqliteRepository {
    async fn insert_user(&self, profile: &UserProfile) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (id, name, email)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(profile.id().as_str())
        .bind(profile.name())
        .bind(profile.email())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }

    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query("SELECT id, name, email FROM users WHERE id = ?1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_user_row).transpose()
    }

    async fn delete_user(&self, user_id: &UserId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
