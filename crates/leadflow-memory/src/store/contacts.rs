//! Contact resolution and mutation.

use super::{parse_ts, Store};
use chrono::Utc;
use leadflow_core::{
    contact::{Contact, ContactHints},
    error::LeadflowError,
    flow::FlowStep,
};
use uuid::Uuid;

/// Row shape shared by every contact query.
type ContactRow = (
    String,         // id
    String,         // phone
    Option<String>, // name
    Option<String>, // avatar_url
    i64,            // is_bot_paused
    String,         // flow_step
    String,         // last_interaction
);

const CONTACT_COLUMNS: &str =
    "id, phone, name, avatar_url, is_bot_paused, flow_step, last_interaction";

fn row_to_contact(row: ContactRow) -> Contact {
    Contact {
        id: row.0,
        phone: row.1,
        name: row.2,
        avatar_url: row.3,
        is_bot_paused: row.4 != 0,
        flow_step: row.5,
        last_interaction: parse_ts(&row.6),
    }
}

impl Store {
    /// Atomic find-or-create keyed by phone number.
    ///
    /// Concurrent calls for the same new phone collapse to one row — the
    /// insert is `ON CONFLICT DO NOTHING` and both callers read back the
    /// surviving row. On an existing contact, differing hints are merged
    /// unless the message is bot-originated; a known name is never replaced
    /// by a placeholder. `last_interaction` is bumped on every resolve.
    pub async fn resolve_contact(
        &self,
        phone: &str,
        hints: &ContactHints,
        from_me: bool,
    ) -> Result<Contact, LeadflowError> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO contacts (id, phone, name, avatar_url, flow_step, last_interaction) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(phone)
        .bind(hints.name.as_deref().filter(|_| hints.has_real_name()))
        .bind(hints.avatar_url.as_deref())
        .bind(FlowStep::New.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("contact insert failed: {e}")))?;

        let row: ContactRow = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("contact query failed: {e}")))?;

        let mut contact = row_to_contact(row);

        let new_name = if !from_me
            && hints.has_real_name()
            && hints.name != contact.name
        {
            hints.name.clone()
        } else {
            None
        };
        let new_avatar = if !from_me
            && hints.avatar_url.is_some()
            && hints.avatar_url != contact.avatar_url
        {
            hints.avatar_url.clone()
        } else {
            None
        };

        if new_name.is_some() || new_avatar.is_some() {
            sqlx::query(
                "UPDATE contacts SET \
                 name = COALESCE(?, name), \
                 avatar_url = COALESCE(?, avatar_url), \
                 last_interaction = ? \
                 WHERE id = ?",
            )
            .bind(new_name.as_deref())
            .bind(new_avatar.as_deref())
            .bind(&now)
            .bind(&contact.id)
            .execute(&self.pool)
            .await
            .map_err(|e| LeadflowError::Memory(format!("contact update failed: {e}")))?;

            if let Some(name) = new_name {
                contact.name = Some(name);
            }
            if let Some(avatar) = new_avatar {
                contact.avatar_url = Some(avatar);
            }
        } else {
            sqlx::query("UPDATE contacts SET last_interaction = ? WHERE id = ?")
                .bind(&now)
                .bind(&contact.id)
                .execute(&self.pool)
                .await
                .map_err(|e| LeadflowError::Memory(format!("contact touch failed: {e}")))?;
        }

        contact.last_interaction = Utc::now();
        Ok(contact)
    }

    /// Look up a contact by phone.
    pub async fn get_contact(&self, phone: &str) -> Result<Option<Contact>, LeadflowError> {
        let row: Option<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE phone = ?"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("contact query failed: {e}")))?;

        Ok(row.map(row_to_contact))
    }

    /// All contacts, most recently active first.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>, LeadflowError> {
        let rows: Vec<ContactRow> = sqlx::query_as(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts ORDER BY last_interaction DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("contact list failed: {e}")))?;

        Ok(rows.into_iter().map(row_to_contact).collect())
    }

    /// Advance (or reset) the stored flow step.
    pub async fn set_flow_step(
        &self,
        contact_id: &str,
        step: FlowStep,
    ) -> Result<(), LeadflowError> {
        sqlx::query("UPDATE contacts SET flow_step = ? WHERE id = ?")
            .bind(step.as_str())
            .bind(contact_id)
            .execute(&self.pool)
            .await
            .map_err(|e| LeadflowError::Memory(format!("flow step update failed: {e}")))?;
        Ok(())
    }

    /// Operator pause/resume toggle. Returns the updated contact.
    pub async fn set_paused(
        &self,
        phone: &str,
        paused: bool,
    ) -> Result<Option<Contact>, LeadflowError> {
        let result = sqlx::query("UPDATE contacts SET is_bot_paused = ? WHERE phone = ?")
            .bind(paused as i64)
            .bind(phone)
            .execute(&self.pool)
            .await
            .map_err(|e| LeadflowError::Memory(format!("pause update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_contact(phone).await
    }

    /// Full flow reset: back to the initial step, profile blanked.
    /// The profile row itself survives — nothing in the store deletes rows.
    pub async fn reset_flow(&self, contact_id: &str) -> Result<(), LeadflowError> {
        self.set_flow_step(contact_id, FlowStep::New).await?;

        sqlx::query(
            "UPDATE lead_profiles SET \
             interest = NULL, has_site = NULL, sells_online = NULL, \
             product_count = NULL, main_goal = NULL, offer_choice = NULL, \
             score = 0, updated_at = ? \
             WHERE contact_id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(contact_id)
        .execute(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("profile reset failed: {e}")))?;
        Ok(())
    }
}
