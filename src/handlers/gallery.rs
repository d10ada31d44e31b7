use actix_web::{web, HttpResponse};
use log::info;
use mongodb::bson::DateTime;
use serde_json::json;

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{GalleryItem, GalleryQuery, GalleryResponse, UploadImageRequest};
use crate::services::decode_image_payload;
use crate::state::AppState;

fn responses(items: Vec<GalleryItem>) -> Vec<GalleryResponse> {
    items.into_iter().map(GalleryResponse::from).collect()
}

pub async fn list_gallery(
    state: web::Data<AppState>,
    query: web::Query<GalleryQuery>,
) -> AppResult<HttpResponse> {
    let package_id = query.package_id.as_deref().map(string_to_id).transpose()?;
    let items = state.db.list_gallery(true, package_id.as_ref()).await?;
    Ok(HttpResponse::Ok().json(responses(items)))
}

pub async fn pending_gallery(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let items = state.db.list_gallery(false, None).await?;
    Ok(HttpResponse::Ok().json(responses(items)))
}

pub async fn upload_image(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<UploadImageRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;
    let body = body.into_inner();
    let image = decode_image_payload(&body.image, state.config.max_upload_bytes)?;

    let package_id = body.package_id.as_deref().map(string_to_id).transpose()?;
    if let Some(package_id) = package_id.as_ref() {
        if state.db.find_package(package_id).await?.is_none() {
            return Err(AppError::not_found("Package"));
        }
    }

    let uploaded = state
        .imgbb
        .upload(&image, &format!("gallery-{}", user.user_id.to_hex()))
        .await?;
    let item = state
        .db
        .create_gallery_item(GalleryItem {
            id: None,
            user_id: user.user_id,
            package_id,
            image_url: uploaded.url,
            display_url: uploaded.display_url,
            delete_url: uploaded.delete_url,
            caption: body.caption.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            approved: user.is_admin(),
            created_at: DateTime::now(),
        })
        .await?;
    info!(
        "Gallery image {} uploaded by {}",
        item.id.map(|id| id.to_hex()).unwrap_or_default(),
        user.user_id.to_hex()
    );

    Ok(HttpResponse::Created().json(GalleryResponse::from(item)))
}

pub async fn approve_image(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let id = string_to_id(&path)?;
    let item = state.db.approve_gallery_item(&id).await?;
    state
        .db
        .record_audit(&user.user_id, "approve_image", "gallery", Some(id), item.display_url.clone())
        .await;
    Ok(HttpResponse::Ok().json(GalleryResponse::from(item)))
}

pub async fn delete_image(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = string_to_id(&path)?;
    let item = state
        .db
        .find_gallery_item(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Gallery item"))?;
    if item.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    if !state.db.delete_gallery_item(&id).await? {
        return Err(AppError::not_found("Gallery item"));
    }

    if user.is_admin() && item.user_id != user.user_id {
        state
            .db
            .record_audit(&user.user_id, "delete_image", "gallery", Some(id), item.image_url)
            .await;
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Image deleted" })))
}
