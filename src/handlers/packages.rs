use actix_web::{web, HttpResponse};
use mongodb::bson::{self, DateTime, Document};
use serde_json::json;

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    package::validate_tiers, CreatePackageRequest, Package, PackageQuery, PackageResponse,
    QuoteQuery, UpdatePackageRequest, UploadImageRequest,
};
use crate::services::decode_image_payload;
use crate::state::AppState;

/// Admins see inactive packages when they ask for them; everyone else never does.
fn include_inactive(user: Option<&AuthUser>, requested: bool) -> bool {
    requested && user.map_or(false, AuthUser::is_admin)
}

pub async fn list_packages(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    query: web::Query<PackageQuery>,
) -> AppResult<HttpResponse> {
    let packages: Vec<PackageResponse> = state
        .db
        .list_packages(
            query.location.as_deref(),
            include_inactive(user.as_ref(), query.include_inactive),
        )
        .await?
        .into_iter()
        .map(PackageResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(packages))
}

pub async fn get_package(
    state: web::Data<AppState>,
    user: Option<AuthUser>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = string_to_id(&path)?;
    let package = state
        .db
        .find_package(&id)
        .await?
        .filter(|p| p.active || include_inactive(user.as_ref(), true))
        .ok_or_else(|| AppError::not_found("Package"))?;
    Ok(HttpResponse::Ok().json(PackageResponse::from(package)))
}

pub async fn quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<QuoteQuery>,
) -> AppResult<HttpResponse> {
    validate_request(&*query)?;
    let id = string_to_id(&path)?;
    let package = state
        .db
        .find_package(&id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::not_found("Package"))?;
    let quote = package.quote(query.adults, query.children, query.needs_guide)?;
    Ok(HttpResponse::Ok().json(quote))
}

pub async fn create_package(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreatePackageRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    validate_tiers(&body.price_tiers)?;
    let body = body.into_inner();

    let now = DateTime::now();
    let package = state
        .db
        .create_package(Package {
            id: None,
            title: body.title.trim().to_string(),
            description: body.description,
            location: body.location.trim().to_string(),
            duration_days: body.duration_days,
            base_price: body.base_price,
            price_tiers: body.price_tiers,
            guide_fee_per_day: body.guide_fee_per_day,
            max_group_size: body.max_group_size,
            highlights: body.highlights,
            images: body.images,
            active: body.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
        .await?;

    state
        .db
        .record_audit(&user.user_id, "create_package", "packages", package.id, package.title.clone())
        .await;
    Ok(HttpResponse::Created().json(PackageResponse::from(package)))
}

fn update_document(body: UpdatePackageRequest) -> AppResult<Document> {
    let mut set = Document::new();
    if let Some(title) = body.title {
        set.insert("title", title.trim());
    }
    if let Some(description) = body.description {
        set.insert("description", description);
    }
    if let Some(location) = body.location {
        set.insert("location", location.trim());
    }
    if let Some(days) = body.duration_days {
        set.insert("duration_days", days);
    }
    if let Some(price) = body.base_price {
        set.insert("base_price", price);
    }
    if let Some(tiers) = body.price_tiers {
        validate_tiers(&tiers)?;
        set.insert("price_tiers", bson::to_bson(&tiers)?);
    }
    if let Some(fee) = body.guide_fee_per_day {
        set.insert("guide_fee_per_day", fee);
    }
    if let Some(size) = body.max_group_size {
        set.insert("max_group_size", size);
    }
    if let Some(highlights) = body.highlights {
        set.insert("highlights", highlights);
    }
    if let Some(images) = body.images {
        set.insert("images", images);
    }
    if let Some(active) = body.active {
        set.insert("active", active);
    }
    Ok(set)
}

pub async fn update_package(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UpdatePackageRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    let id = string_to_id(&path)?;

    let set = update_document(body.into_inner())?;
    if set.is_empty() {
        return Err(AppError::validation("Nothing to update"));
    }
    let details = set.keys().cloned().collect::<Vec<_>>().join(", ");
    let package = state.db.update_package(&id, set).await?;

    state
        .db
        .record_audit(&user.user_id, "update_package", "packages", Some(id), details)
        .await;
    Ok(HttpResponse::Ok().json(PackageResponse::from(package)))
}

pub async fn delete_package(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let id = string_to_id(&path)?;

    let open = state.db.count_open_bookings_for_package(&id).await?;
    if open > 0 {
        return Err(AppError::conflict(format!(
            "Package has {} open bookings; deactivate it instead",
            open
        )));
    }
    if !state.db.delete_package(&id).await? {
        return Err(AppError::not_found("Package"));
    }

    state
        .db
        .record_audit(&user.user_id, "delete_package", "packages", Some(id), "deleted")
        .await;
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Package deleted" })))
}

pub async fn upload_package_image(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<UploadImageRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    validate_request(&*body)?;
    let id = string_to_id(&path)?;
    let image = decode_image_payload(&body.image, state.config.max_upload_bytes)?;

    if state.db.find_package(&id).await?.is_none() {
        return Err(AppError::not_found("Package"));
    }
    let uploaded = state
        .imgbb
        .upload(&image, &format!("package-{}", id.to_hex()))
        .await?;
    let package = state.db.push_package_image(&id, &uploaded.url).await?;

    state
        .db
        .record_audit(
            &user.user_id,
            "add_package_image",
            "packages",
            Some(id),
            uploaded.url.clone(),
        )
        .await;
    Ok(HttpResponse::Created().json(PackageResponse::from(package)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceTier, Role};
    use mongodb::bson::oid::ObjectId;

    #[test]
    fn only_admins_see_inactive_packages() {
        let admin = AuthUser { user_id: ObjectId::new(), role: Role::Admin };
        let customer = AuthUser { user_id: ObjectId::new(), role: Role::Customer };
        assert!(include_inactive(Some(&admin), true));
        assert!(!include_inactive(Some(&admin), false));
        assert!(!include_inactive(Some(&customer), true));
        assert!(!include_inactive(None, true));
    }

    #[test]
    fn update_document_only_sets_given_fields() {
        let set = update_document(UpdatePackageRequest {
            title: Some("  Yala Sunrise  ".into()),
            active: Some(false),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(set.get_str("title").unwrap(), "Yala Sunrise");
        assert!(!set.get_bool("active").unwrap());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn update_document_rejects_bad_tiers() {
        let result = update_document(UpdatePackageRequest {
            price_tiers: Some(vec![
                PriceTier { min_people: 1, max_people: 3, price_per_person: 90.0 },
                PriceTier { min_people: 2, max_people: 6, price_per_person: 80.0 },
            ]),
            ..Default::default()
        });
        assert!(result.is_err());
    }
}
