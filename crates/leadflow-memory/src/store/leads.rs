//! Lead profile upserts.

use super::Store;
use chrono::Utc;
use leadflow_core::{
    contact::{LeadProfile, ProfileFields},
    error::LeadflowError,
};

impl Store {
    /// Find-or-create the profile row for a contact, then merge the given
    /// fields into it. `None` fields leave stored values untouched; the
    /// score delta accumulates onto the stored score.
    pub async fn upsert_profile(
        &self,
        contact_id: &str,
        fields: &ProfileFields,
    ) -> Result<(), LeadflowError> {
        sqlx::query(
            "INSERT INTO lead_profiles \
             (contact_id, interest, has_site, sells_online, product_count, main_goal, offer_choice, score, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(contact_id) DO UPDATE SET \
             interest = COALESCE(excluded.interest, lead_profiles.interest), \
             has_site = COALESCE(excluded.has_site, lead_profiles.has_site), \
             sells_online = COALESCE(excluded.sells_online, lead_profiles.sells_online), \
             product_count = COALESCE(excluded.product_count, lead_profiles.product_count), \
             main_goal = COALESCE(excluded.main_goal, lead_profiles.main_goal), \
             offer_choice = COALESCE(excluded.offer_choice, lead_profiles.offer_choice), \
             score = lead_profiles.score + excluded.score, \
             updated_at = excluded.updated_at",
        )
        .bind(contact_id)
        .bind(fields.interest.as_deref())
        .bind(fields.has_site.as_deref())
        .bind(fields.sells_online.as_deref())
        .bind(fields.product_count.as_deref())
        .bind(fields.main_goal.as_deref())
        .bind(fields.offer_choice.as_deref())
        .bind(fields.score_delta)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("profile upsert failed: {e}")))?;

        Ok(())
    }

    /// The accumulated profile for a contact, if any answer was captured yet.
    pub async fn get_profile(
        &self,
        contact_id: &str,
    ) -> Result<Option<LeadProfile>, LeadflowError> {
        let row: Option<(
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            i64,
        )> = sqlx::query_as(
            "SELECT contact_id, interest, has_site, sells_online, product_count, \
             main_goal, offer_choice, score \
             FROM lead_profiles WHERE contact_id = ?",
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LeadflowError::Memory(format!("profile query failed: {e}")))?;

        Ok(row.map(
            |(contact_id, interest, has_site, sells_online, product_count, main_goal, offer_choice, score)| {
                LeadProfile {
                    contact_id,
                    interest,
                    has_site,
                    sells_online,
                    product_count,
                    main_goal,
                    offer_choice,
                    score,
                }
            },
        ))
    }
}
