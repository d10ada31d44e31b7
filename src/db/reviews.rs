use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
};

use super::mongodb::{collect, inserted_id, is_duplicate_key, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::Review;

impl MongoDB {
    pub async fn create_review(&self, mut review: Review) -> AppResult<Review> {
        let result = self.reviews().insert_one(&review, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::AlreadyExists {
                    resource: "A review for this booking".into(),
                }
            } else {
                e.into()
            }
        })?;
        review.id = Some(inserted_id(&result)?);
        Ok(review)
    }

    pub async fn find_review(&self, id: &ObjectId) -> AppResult<Option<Review>> {
        Ok(self.reviews().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn find_review_for_booking(&self, booking_id: &ObjectId) -> AppResult<Option<Review>> {
        Ok(self
            .reviews()
            .find_one(doc! { "booking_id": *booking_id }, None)
            .await?)
    }

    pub async fn package_reviews(&self, package_id: &ObjectId) -> AppResult<Vec<Review>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        collect(
            self.reviews()
                .find(doc! { "package_id": *package_id }, options)
                .await?,
        )
        .await
    }

    pub async fn latest_reviews(&self, limit: i64) -> AppResult<Vec<Review>> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .build();
        collect(self.reviews().find(None, options).await?).await
    }

    pub async fn delete_review(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.reviews().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count == 1)
    }
}
