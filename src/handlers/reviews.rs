use actix_web::{web, HttpResponse};
use mongodb::bson::DateTime;
use serde_json::json;

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{BookingStatus, CreateReviewRequest, PackageReviews, Review, ReviewResponse};
use crate::state::AppState;

const LATEST_REVIEWS: i64 = 20;

pub async fn create_review(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateReviewRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;
    let body = body.into_inner();
    let booking_id = string_to_id(&body.booking_id)?;

    let booking = state
        .db
        .find_booking(&booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))?;
    if booking.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::validation("Only completed trips can be reviewed"));
    }
    if state.db.find_review_for_booking(&booking_id).await?.is_some() {
        return Err(AppError::AlreadyExists {
            resource: "A review for this booking".into(),
        });
    }

    let author = state
        .db
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let review = state
        .db
        .create_review(Review {
            id: None,
            user_id: user.user_id,
            user_name: author.name,
            package_id: booking.package_id,
            booking_id,
            rating: body.rating,
            comment: body.comment.trim().to_string(),
            created_at: DateTime::now(),
        })
        .await?;

    Ok(HttpResponse::Created().json(ReviewResponse::from(review)))
}

pub async fn latest_reviews(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let reviews: Vec<ReviewResponse> = state
        .db
        .latest_reviews(LATEST_REVIEWS)
        .await?
        .into_iter()
        .map(ReviewResponse::from)
        .collect();
    Ok(HttpResponse::Ok().json(reviews))
}

pub async fn package_reviews(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let package_id = string_to_id(&path)?;
    if state.db.find_package(&package_id).await?.is_none() {
        return Err(AppError::not_found("Package"));
    }
    let reviews = state.db.package_reviews(&package_id).await?;
    Ok(HttpResponse::Ok().json(PackageReviews::new(reviews)))
}

pub async fn delete_review(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = string_to_id(&path)?;
    let review = state
        .db
        .find_review(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Review"))?;
    if review.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    if !state.db.delete_review(&id).await? {
        return Err(AppError::not_found("Review"));
    }

    if user.is_admin() && review.user_id != user.user_id {
        state
            .db
            .record_audit(
                &user.user_id,
                "delete_review",
                "reviews",
                Some(id),
                format!("{} stars by {}", review.rating, review.user_name),
            )
            .await;
    }
    Ok(HttpResponse::Ok().json(json!({ "success": true, "message": "Review deleted" })))
}
