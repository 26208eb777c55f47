//! Append-only message log.

use super::{parse_ts, Store};
use chrono::Utc;
use leadflow_core::{contact::StoredMessage, error::LeadflowError, traits::HistoryEntry};
use uuid::Uuid;

impl Store {
    /// Append one chat line. Returns the created record for event emission.
    pub async fn append_message(
        &self,
        contact_id: &str,
        body: &str,
        from_me: bool,
    ) -> Result<StoredMessage, LeadflowError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO messages (id, contact_id, from_me, body, timestamp) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(contact_id)
        .bind(from_me as i64)
        .bind(body)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("message insert failed: {e}")))?;

        Ok(StoredMessage {
            id,
            contact_id: contact_id.to_string(),
            from_me,
            body: body.to_string(),
            timestamp: now,
        })
    }

    /// The last `limit` messages in chronological order (oldest first) —
    /// the window fed to the AI responder. Queried newest-first, then
    /// reversed, so the limit trims the old end, not the recent one.
    pub async fn recent_history(
        &self,
        contact_id: &str,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, LeadflowError> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT from_me, body FROM messages \
             WHERE contact_id = ? \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(contact_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("history query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .rev()
            .map(|(from_me, body)| HistoryEntry {
                from_me: from_me != 0,
                body,
            })
            .collect())
    }

    /// Full conversation for a contact, oldest first.
    pub async fn messages_for(
        &self,
        contact_id: &str,
    ) -> Result<Vec<StoredMessage>, LeadflowError> {
        let rows: Vec<(String, String, i64, String, String)> = sqlx::query_as(
            "SELECT id, contact_id, from_me, body, timestamp FROM messages \
             WHERE contact_id = ? \
             ORDER BY timestamp ASC, rowid ASC",
        )
        .bind(contact_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("messages query failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(id, contact_id, from_me, body, timestamp)| StoredMessage {
                id,
                contact_id,
                from_me: from_me != 0,
                body,
                timestamp: parse_ts(&timestamp),
            })
            .collect())
    }
}
