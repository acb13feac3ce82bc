//! Purchased-lead ledger
//!
//! Tracks which specific leads a user has already bought from a collection
//! so the same record is never delivered twice. The unique
//! (user, collection, lead key) constraint at the persistence layer is the
//! authoritative guard; everything here is either a read or an insert that
//! ignores duplicates.
//!
//! Lead identity is a SHA-256 hash over the row's natural-key field values,
//! not a storage id, so re-importing a table never makes an already-owned
//! record purchasable again.

use leadforge_common::db::Repository;
use leadforge_common::errors::Result;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use tracing::warn;
use uuid::Uuid;

/// Derive a row's stable lead key from the collection's natural key
///
/// Returns None when any natural-key field is missing from the row: such a
/// row has no stable identity and is never delivered.
pub fn lead_key(natural_key: &[String], fields: &HashMap<String, String>) -> Option<String> {
    if natural_key.is_empty() {
        return None;
    }

    let mut hasher = Sha256::new();
    for field in natural_key {
        let value = fields.get(field)?;
        hasher.update(value.trim().to_lowercase().as_bytes());
        hasher.update(b"\x1f");
    }

    Some(hex::encode(hasher.finalize()))
}

/// Ledger of leads already sold, per user and collection
#[derive(Clone)]
pub struct PurchasedLedger {
    repository: Repository,
}

impl PurchasedLedger {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Number of distinct leads the user has bought from the collection
    pub async fn count_purchased(&self, user_id: Uuid, collection_id: Uuid) -> Result<u64> {
        self.repository.count_purchased(user_id, collection_id).await
    }

    /// Whether one specific lead is already owned
    pub async fn is_purchased(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        lead_key: &str,
    ) -> Result<bool> {
        self.repository
            .is_purchased(user_id, collection_id, lead_key)
            .await
    }

    /// Every lead key the user owns in the collection
    ///
    /// Used by the order builder as a best-effort pre-filter; the database
    /// constraint remains the binding guard against concurrent orders.
    pub async fn purchased_keys(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
    ) -> Result<HashSet<String>> {
        self.repository.purchased_keys(user_id, collection_id).await
    }

    /// Record delivered leads, idempotently
    ///
    /// Re-invoking with keys already recorded for this (user, collection)
    /// neither errors nor double counts: collisions are expected under retry
    /// and under a race with a concurrent order, and are swallowed. Any
    /// other persistence error aborts and surfaces. Returns the number of
    /// keys newly recorded.
    pub async fn record_purchases(
        &self,
        user_id: Uuid,
        collection_id: Uuid,
        order_id: Uuid,
        lead_keys: &[String],
    ) -> Result<u64> {
        let recorded = self
            .repository
            .insert_purchased_leads(user_id, collection_id, order_id, lead_keys)
            .await?;

        let skipped = lead_keys.len() as u64 - recorded;
        if skipped > 0 {
            warn!(
                user_id = %user_id,
                collection_id = %collection_id,
                order_id = %order_id,
                skipped,
                "Some leads were already recorded; kept by the earlier owner"
            );
        }

        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_lead_key_is_deterministic() {
        let natural_key = vec!["email".to_string(), "phone".to_string()];
        let row = fields(&[("email", "a@b.com"), ("phone", "555-0100"), ("name", "Ann")]);

        let k1 = lead_key(&natural_key, &row).unwrap();
        let k2 = lead_key(&natural_key, &row).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(k1.len(), 64);
    }

    #[test]
    fn test_lead_key_ignores_non_key_fields() {
        let natural_key = vec!["email".to_string()];
        let row_a = fields(&[("email", "a@b.com"), ("name", "Ann")]);
        let row_b = fields(&[("email", "a@b.com"), ("name", "Bob")]);

        assert_eq!(
            lead_key(&natural_key, &row_a),
            lead_key(&natural_key, &row_b)
        );
    }

    #[test]
    fn test_lead_key_normalizes_case_and_whitespace() {
        let natural_key = vec!["email".to_string()];
        let row_a = fields(&[("email", "A@B.com ")]);
        let row_b = fields(&[("email", "a@b.com")]);

        assert_eq!(
            lead_key(&natural_key, &row_a),
            lead_key(&natural_key, &row_b)
        );
    }

    #[test]
    fn test_lead_key_differs_per_value() {
        let natural_key = vec!["email".to_string()];
        let row_a = fields(&[("email", "a@b.com")]);
        let row_b = fields(&[("email", "c@d.com")]);

        assert_ne!(
            lead_key(&natural_key, &row_a),
            lead_key(&natural_key, &row_b)
        );
    }

    #[test]
    fn test_lead_key_missing_field_yields_none() {
        let natural_key = vec!["email".to_string(), "phone".to_string()];
        let row = fields(&[("email", "a@b.com")]);

        assert_eq!(lead_key(&natural_key, &row), None);
    }

    #[test]
    fn test_lead_key_empty_natural_key_yields_none() {
        let row = fields(&[("email", "a@b.com")]);
        assert_eq!(lead_key(&[], &row), None);
    }

    #[test]
    fn test_field_separator_prevents_ambiguity() {
        // "ab" + "c" must not collide with "a" + "bc"
        let natural_key = vec!["first".to_string(), "second".to_string()];
        let row_a = fields(&[("first", "ab"), ("second", "c")]);
        let row_b = fields(&[("first", "a"), ("second", "bc")]);

        assert_ne!(
            lead_key(&natural_key, &row_a),
            lead_key(&natural_key, &row_b)
        );
    }
}
