use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};

use super::format_datetime;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AdminAudit {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub admin_id: ObjectId,
    pub action: String,
    pub target_collection: String,
    #[serde(default)]
    pub target_id: Option<ObjectId>,
    pub details: String,
    pub created_at: DateTime,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct AuditResponse {
    pub id: String,
    pub admin_id: String,
    pub action: String,
    pub target_collection: String,
    pub target_id: Option<String>,
    pub details: String,
    pub created_at: String,
}

impl From<AdminAudit> for AuditResponse {
    fn from(a: AdminAudit) -> Self {
        Self {
            id: a.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            admin_id: a.admin_id.to_hex(),
            action: a.action,
            target_collection: a.target_collection,
            target_id: a.target_id.map(|oid| oid.to_hex()),
            details: a.details,
            created_at: format_datetime(&a.created_at),
        }
    }
}

#[derive(Serialize, Default)]
pub struct DashboardStats {
    pub users: u64,
    pub packages: u64,
    pub bookings_by_status: std::collections::BTreeMap<String, u64>,
    pub revenue: f64,
}
