use actix_web::{web, HttpResponse};
use mongodb::bson::DateTime;

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    dates::parse_month, GeneratePayrollRequest, PayFigures, Payroll, PayrollQuery,
    PayrollResponse, PayrollStatus,
};
use crate::state::AppState;

fn responses(records: Vec<Payroll>) -> Vec<PayrollResponse> {
    records.into_iter().map(PayrollResponse::from).collect()
}

pub async fn generate_payroll(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<GeneratePayrollRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    let staff_id = string_to_id(&body.staff_id)?;
    let month = parse_month(&body.month)?;

    let profile = state
        .db
        .find_staff(&staff_id)
        .await?
        .ok_or_else(|| AppError::not_found("Staff member"))?;
    let existing = state.db.find_payroll_for(&staff_id, &month.key).await?;
    Payroll::ensure_regenerable(existing.as_ref())?;

    let attendance = state
        .db
        .list_attendance(Some(&staff_id), Some((month.first_day.as_str(), month.last_day.as_str())))
        .await?;
    let trips = state
        .db
        .count_completed_trips(&staff_id, &month.first_day, &month.last_day)
        .await?;
    let trips = i32::try_from(trips).map_err(|_| AppError::Internal("trip count overflow".into()))?;

    let figures = PayFigures::compute(
        &attendance,
        trips,
        profile.daily_rate,
        profile.trip_bonus,
        body.deductions,
    );
    let payroll = state
        .db
        .upsert_payroll(&Payroll {
            id: None,
            staff_id,
            month: month.key.clone(),
            figures,
            status: PayrollStatus::Draft,
            generated_at: DateTime::now(),
            paid_at: None,
        })
        .await?;

    state
        .db
        .record_audit(
            &user.user_id,
            "generate_payroll",
            "payroll",
            payroll.id,
            format!("{} net {:.2}", payroll.month, payroll.figures.net_pay),
        )
        .await;
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}

pub async fn list_payroll(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<PayrollQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let month = query.month.as_deref().map(parse_month).transpose()?;
    let records = state
        .db
        .list_payroll(None, month.as_ref().map(|m| m.key.as_str()))
        .await?;
    Ok(HttpResponse::Ok().json(responses(records)))
}

pub async fn my_payroll(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    if !user.role.is_staff() {
        return Err(AppError::Forbidden);
    }
    let records = state.db.list_payroll(Some(&user.user_id), None).await?;
    Ok(HttpResponse::Ok().json(responses(records)))
}

pub async fn mark_paid(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let id = string_to_id(&path)?;
    let payroll = state.db.mark_payroll_paid(&id).await?;
    state
        .db
        .record_audit(
            &user.user_id,
            "pay_payroll",
            "payroll",
            Some(id),
            format!("{} net {:.2}", payroll.month, payroll.figures.net_pay),
        )
        .await;
    Ok(HttpResponse::Ok().json(PayrollResponse::from(payroll)))
}
