use actix_web::{web, HttpResponse};
use mongodb::bson::{oid::ObjectId, DateTime, Document};
use serde_json::json;

use crate::auth::{hash_password, AuthUser};
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    AvailabilityQuery, CreateStaffRequest, Role, Staff, StaffQuery,
    StaffResponse, UpdateStaffRequest, User,
};
use crate::state::AppState;

async fn with_accounts(state: &AppState, staff: Vec<Staff>) -> AppResult<Vec<StaffResponse>> {
    let ids: Vec<ObjectId> = staff.iter().map(|s| s.user_id).collect();
    let accounts = state.db.users_by_ids(&ids).await?;
    Ok(staff
        .into_iter()
        .map(|s| {
            let (name, email) = accounts
                .get(&s.user_id)
                .map(|u| (u.name.clone(), u.email.clone()))
                .unwrap_or_else(|| ("Unknown".to_string(), String::new()));
            StaffResponse::new(s, name, email)
        })
        .collect())
}

pub async fn create_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateStaffRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    let body = body.into_inner();
    if !body.role.is_staff() {
        return Err(AppError::validation("Staff role must be driver or guide"));
    }
    if body.role == Role::Driver && body.license_number.as_deref().map_or(true, |l| l.trim().is_empty()) {
        return Err(AppError::validation("Drivers need a licence number"));
    }

    let now = DateTime::now();
    let account = state
        .db
        .create_user(User {
            id: None,
            name: body.name.trim().to_string(),
            email: body.email,
            password: hash_password(&body.password)?,
            role: body.role,
            phone: Some(body.phone.clone()),
            created_at: now,
            updated_at: now,
        })
        .await?;
    let user_id = account
        .id
        .ok_or_else(|| AppError::Internal("user document missing id".into()))?;

    let profile = Staff {
        id: None,
        user_id,
        role: body.role,
        phone: body.phone,
        license_number: body.license_number,
        languages: body.languages,
        daily_rate: body.daily_rate,
        trip_bonus: body.trip_bonus,
        available: true,
        created_at: now,
        updated_at: now,
    };
    let profile = match state.db.create_staff(profile).await {
        Ok(profile) => profile,
        Err(e) => {
            // Don't leave a staff login without a profile behind.
            state.db.delete_user(&user_id).await?;
            return Err(e);
        }
    };

    state
        .db
        .record_audit(
            &user.user_id,
            "create_staff",
            "staff",
            Some(user_id),
            format!("{} {}", profile.role, account.email),
        )
        .await;

    Ok(HttpResponse::Created().json(StaffResponse::new(profile, account.name, account.email)))
}

pub async fn list_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<StaffQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let staff = state.db.list_staff(query.role).await?;
    Ok(HttpResponse::Ok().json(with_accounts(&state, staff).await?))
}

/// Staff of a role who are marked available and free over the whole date range.
pub async fn available_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<AvailabilityQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let (start, end) = query.window()?;

    let busy = state.db.busy_staff_ids(&start, &end, None).await?;
    let free: Vec<Staff> = state
        .db
        .list_staff(Some(query.role))
        .await?
        .into_iter()
        .filter(|s| s.available && !busy.contains(&s.user_id))
        .collect();
    Ok(HttpResponse::Ok().json(with_accounts(&state, free).await?))
}

pub async fn update_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdateStaffRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    let staff_id = string_to_id(&path)?;
    let body = body.into_inner();

    let mut set = Document::new();
    if let Some(phone) = body.phone {
        set.insert("phone", phone);
    }
    if let Some(license) = body.license_number {
        set.insert("license_number", license);
    }
    if let Some(languages) = body.languages {
        set.insert("languages", languages);
    }
    if let Some(rate) = body.daily_rate {
        set.insert("daily_rate", rate);
    }
    if let Some(bonus) = body.trip_bonus {
        set.insert("trip_bonus", bonus);
    }
    if let Some(available) = body.available {
        set.insert("available", available);
    }
    if set.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }

    let details = set.keys().cloned().collect::<Vec<_>>().join(", ");
    let updated = state.db.update_staff(&staff_id, set).await?;
    state
        .db
        .record_audit(&user.user_id, "update_staff", "staff", Some(staff_id), details)
        .await;

    let response = with_accounts(&state, vec![updated])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::not_found("Staff member"))?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn delete_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let staff_id = string_to_id(&path)?;

    let active = state.db.count_active_assignments(&staff_id).await?;
    if active > 0 {
        return Err(AppError::conflict(format!(
            "Staff member is assigned to {} active bookings; reassign them first",
            active
        )));
    }
    if !state.db.delete_staff(&staff_id).await? {
        return Err(AppError::not_found("Staff member"));
    }
    state.db.delete_user(&staff_id).await?;
    state
        .db
        .record_audit(&user.user_id, "delete_staff", "staff", Some(staff_id), "profile and account removed")
        .await;

    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Staff member deleted" })))
}
