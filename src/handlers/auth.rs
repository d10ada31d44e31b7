use actix_web::{web, HttpResponse};
use log::{info, warn};
use mongodb::bson::{doc, DateTime, Document};
use serde_json::json;

use crate::auth::{hash_password, issue_token, verify_password, AuthUser};
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, Role, UpdateProfileRequest,
    User, UserResponse,
};
use crate::state::AppState;

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let user_id = user
        .id
        .ok_or_else(|| AppError::Internal("user document missing id".into()))?;
    let token = issue_token(&user_id, user.role, &state.config.jwt_secret, state.config.jwt_ttl_hours)?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;
    let body = body.into_inner();

    if state.db.find_user_by_email(&body.email).await?.is_some() {
        return Err(AppError::AlreadyExists {
            resource: "An account with this email".into(),
        });
    }

    let now = DateTime::now();
    let user = state
        .db
        .create_user(User {
            id: None,
            name: body.name.trim().to_string(),
            email: body.email,
            password: hash_password(&body.password)?,
            role: Role::Customer,
            phone: body.phone,
            created_at: now,
            updated_at: now,
        })
        .await?;

    Ok(HttpResponse::Created().json(auth_response(&state, user)?))
}

pub async fn login(
    state: web::Data<AppState>,
    credentials: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*credentials)?;

    let user = state
        .db
        .find_user_by_email(&credentials.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&credentials.password, &user.password) {
        warn!("Invalid password attempt for email: {}", credentials.email);
        return Err(AppError::InvalidCredentials);
    }

    info!("User {} authenticated successfully", user.email);
    Ok(HttpResponse::Ok().json(auth_response(&state, user)?))
}

pub async fn me(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    let account = state
        .db
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    Ok(HttpResponse::Ok().json(UserResponse::from(account)))
}

pub async fn update_me(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;
    let body = body.into_inner();

    let mut set = Document::new();
    if let Some(name) = body.name {
        set.insert("name", name.trim());
    }
    if let Some(phone) = body.phone {
        set.insert("phone", phone.trim());
    }
    if set.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }

    let updated = state.db.update_user(&user.user_id, set).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}

pub async fn change_password(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;

    let account = state
        .db
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    if !verify_password(&body.current_password, &account.password) {
        return Err(AppError::InvalidCredentials);
    }

    let hashed = hash_password(&body.new_password)?;
    state
        .db
        .update_user(&user.user_id, doc! { "password": hashed })
        .await?;
    info!("Password changed for user {}", account.email);
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Password updated" })))
}

pub async fn list_users(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let users: Vec<UserResponse> = state
        .db
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}
