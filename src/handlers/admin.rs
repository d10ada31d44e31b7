use actix_web::{web, HttpResponse};
use log::error;
use serde_json::json;

use crate::auth::AuthUser;
use crate::error::AppResult;
use crate::models::{AuditQuery, AuditResponse, DashboardStats};
use crate::state::AppState;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 500;

fn audit_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT)
}

pub async fn audit_log(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<AuditQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let entries: Vec<AuditResponse> = state
        .db
        .list_audit(audit_limit(query.limit))
        .await?
        .into_iter()
        .map(AuditResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(entries))
}

pub async fn stats(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let stats = DashboardStats {
        users: state.db.count_users().await?,
        packages: state.db.count_packages().await?,
        bookings_by_status: state.db.booking_status_counts().await?,
        revenue: crate::models::round2(state.db.paid_revenue().await?),
    };
    Ok(HttpResponse::Ok().json(stats))
}

/// Liveness plus a database ping; the process answers even when Mongo is down.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(e) => {
            error!("Health check ping failed: {}", e);
            "down"
        }
    };
    HttpResponse::Ok().json(json!({ "status": "ok", "database": database }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_limit_is_clamped() {
        assert_eq!(audit_limit(None), 50);
        assert_eq!(audit_limit(Some(0)), 1);
        assert_eq!(audit_limit(Some(10_000)), 500);
        assert_eq!(audit_limit(Some(120)), 120);
    }
}
