use log::{info, warn};
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime},
    options::FindOptions,
};

use super::mongodb::{collect, MongoDB};
use crate::error::AppResult;
use crate::models::AdminAudit;

impl MongoDB {
    /// Append an audit entry. A failed write is logged and never fails the caller.
    pub async fn record_audit(
        &self,
        admin_id: &ObjectId,
        action: &str,
        target_collection: &str,
        target_id: Option<ObjectId>,
        details: impl Into<String>,
    ) {
        let entry = AdminAudit {
            id: None,
            admin_id: *admin_id,
            action: action.to_string(),
            target_collection: target_collection.to_string(),
            target_id,
            details: details.into(),
            created_at: DateTime::now(),
        };
        match self.audit().insert_one(&entry, None).await {
            Ok(_) => info!(
                "Admin {} {} on {} {}",
                admin_id.to_hex(),
                action,
                target_collection,
                target_id.map(|id| id.to_hex()).unwrap_or_default()
            ),
            Err(e) => warn!("Failed to record audit entry {}: {}", action, e),
        }
    }

    pub async fn list_audit(&self, limit: i64) -> AppResult<Vec<AdminAudit>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();
        collect(self.audit().find(None, options).await?).await
    }
}
