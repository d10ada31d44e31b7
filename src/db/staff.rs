use std::collections::HashSet;

use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, is_duplicate_key, with_updated_at, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::{BookingStatus, Role, Staff};

impl MongoDB {
    pub async fn create_staff(&self, mut staff: Staff) -> AppResult<Staff> {
        let result = self.staff().insert_one(&staff, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::AlreadyExists {
                    resource: "Staff profile".into(),
                }
            } else {
                e.into()
            }
        })?;
        staff.id = Some(inserted_id(&result)?);
        Ok(staff)
    }

    pub async fn find_staff(&self, user_id: &ObjectId) -> AppResult<Option<Staff>> {
        Ok(self.staff().find_one(doc! { "user_id": *user_id }, None).await?)
    }

    pub async fn list_staff(&self, role: Option<Role>) -> AppResult<Vec<Staff>> {
        let filter = role.map(|r| doc! { "role": r.as_str() });
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        collect(self.staff().find(filter, options).await?).await
    }

    pub async fn update_staff(&self, user_id: &ObjectId, set: Document) -> AppResult<Staff> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.staff()
            .find_one_and_update(
                doc! { "user_id": *user_id },
                doc! { "$set": with_updated_at(set) },
                options,
            )
            .await?
            .ok_or_else(|| AppError::not_found("Staff member"))
    }

    pub async fn delete_staff(&self, user_id: &ObjectId) -> AppResult<bool> {
        let result = self.staff().delete_one(doc! { "user_id": *user_id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    /// Staff already committed to an active booking overlapping `[start, end]`.
    pub async fn busy_staff_ids(
        &self,
        start_date: &str,
        end_date: &str,
        exclude_booking: Option<&ObjectId>,
    ) -> AppResult<HashSet<ObjectId>> {
        let mut filter = doc! {
            "status": { "$in": BookingStatus::ACTIVE_ASSIGNMENT.to_vec() },
            "start_date": { "$lte": end_date },
            "end_date": { "$gte": start_date },
        };
        if let Some(id) = exclude_booking {
            filter.insert("_id", doc! { "$ne": *id });
        }
        let bookings = collect(self.bookings().find(filter, None).await?).await?;
        Ok(bookings
            .into_iter()
            .flat_map(|b| [b.driver_id, b.guide_id])
            .flatten()
            .collect())
    }
}
