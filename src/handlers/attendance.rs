use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use mongodb::bson::{oid::ObjectId, DateTime};

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{AppError, AppResult};
use crate::models::{
    attendance::hours_between,
    dates::{format_date, parse_month},
    AttendanceQuery, AttendanceResponse, Role,
};
use crate::state::AppState;

const STAFF: [Role; 2] = [Role::Driver, Role::Guide];

pub async fn check_in(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_role(&STAFF)?;
    let today = format_date(Utc::now().date_naive());
    let record = state.db.check_in(&user.user_id, &today).await?;
    info!("{} {} checked in for {}", user.role, user.user_id.to_hex(), today);
    Ok(HttpResponse::Created().json(AttendanceResponse::from(record)))
}

pub async fn check_out(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_role(&STAFF)?;
    let now = Utc::now();
    let today = format_date(now.date_naive());

    let record = state
        .db
        .find_attendance(&user.user_id, &today)
        .await?
        .ok_or_else(|| AppError::not_found("Open attendance record for today"))?;
    if record.check_out.is_some() {
        return Err(AppError::conflict("Already checked out"));
    }
    let record_id = record
        .id
        .ok_or_else(|| AppError::Internal("attendance document missing id".into()))?;

    let hours = hours_between(record.check_in.to_chrono(), now);
    let closed = state
        .db
        .check_out(&record_id, DateTime::from_chrono(now), hours)
        .await?;
    info!("{} checked out after {} hours", user.user_id.to_hex(), hours);
    Ok(HttpResponse::Ok().json(AttendanceResponse::from(closed)))
}

async fn attendance_for(
    state: &AppState,
    staff_id: Option<&ObjectId>,
    month: Option<&str>,
) -> AppResult<Vec<AttendanceResponse>> {
    let month = month.map(parse_month).transpose()?;
    let records = state
        .db
        .list_attendance(
            staff_id,
            month.as_ref().map(|m| (m.first_day.as_str(), m.last_day.as_str())),
        )
        .await?;
    Ok(records.into_iter().map(AttendanceResponse::from).collect())
}

pub async fn my_attendance(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<AttendanceQuery>,
) -> AppResult<HttpResponse> {
    user.require_role(&STAFF)?;
    let records = attendance_for(&state, Some(&user.user_id), query.month.as_deref()).await?;
    Ok(HttpResponse::Ok().json(records))
}

pub async fn list_attendance(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<AttendanceQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let staff_id = query.staff_id.as_deref().map(string_to_id).transpose()?;
    let records = attendance_for(&state, staff_id.as_ref(), query.month.as_deref()).await?;
    Ok(HttpResponse::Ok().json(records))
}
