use std::collections::HashMap;

use log::info;
use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, is_duplicate_key, with_updated_at, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::User;

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MongoDB {
    pub async fn create_user(&self, mut user: User) -> AppResult<User> {
        user.email = normalize_email(&user.email);
        let result = self.users().insert_one(&user, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::AlreadyExists {
                    resource: "An account with this email".into(),
                }
            } else {
                e.into()
            }
        })?;
        user.id = Some(inserted_id(&result)?);
        info!("Created {} account {}", user.role, user.email);
        Ok(user)
    }

    pub async fn find_user(&self, id: &ObjectId) -> AppResult<Option<User>> {
        Ok(self.users().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .users()
            .find_one(doc! { "email": normalize_email(email) }, None)
            .await?)
    }

    pub async fn users_by_ids(&self, ids: &[ObjectId]) -> AppResult<HashMap<ObjectId, User>> {
        let cursor = self.users().find(doc! { "_id": { "$in": ids } }, None).await?;
        Ok(collect(cursor)
            .await?
            .into_iter()
            .filter_map(|u| u.id.map(|id| (id, u)))
            .collect())
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        collect(self.users().find(None, options).await?).await
    }

    pub async fn update_user(&self, id: &ObjectId, set: Document) -> AppResult<User> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.users()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": with_updated_at(set) }, options)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn delete_user(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.users().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    pub async fn count_users(&self) -> AppResult<u64> {
        Ok(self.users().count_documents(None, None).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_case_folded() {
        assert_eq!(normalize_email("  Guest@Example.COM "), "guest@example.com");
    }
}
