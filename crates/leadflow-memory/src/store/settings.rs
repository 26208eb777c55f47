//! Generic key-value configuration store.

use super::Store;
use chrono::Utc;
use leadflow_core::error::LeadflowError;

impl Store {
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>, LeadflowError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LeadflowError::Memory(format!("setting query failed: {e}")))?;

        Ok(row.map(|(value,)| value))
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<(), LeadflowError> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("setting upsert failed: {e}")))?;

        Ok(())
    }
}
