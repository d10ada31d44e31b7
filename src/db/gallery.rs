use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::GalleryItem;

impl MongoDB {
    pub async fn create_gallery_item(&self, mut item: GalleryItem) -> AppResult<GalleryItem> {
        let result = self.gallery().insert_one(&item, None).await?;
        item.id = Some(inserted_id(&result)?);
        Ok(item)
    }

    pub async fn list_gallery(&self, approved: bool, package_id: Option<&ObjectId>) -> AppResult<Vec<GalleryItem>> {
        let mut filter = doc! { "approved": approved };
        if let Some(package_id) = package_id {
            filter.insert("package_id", *package_id);
        }
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        collect(self.gallery().find(filter, options).await?).await
    }

    pub async fn find_gallery_item(&self, id: &ObjectId) -> AppResult<Option<GalleryItem>> {
        Ok(self.gallery().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn approve_gallery_item(&self, id: &ObjectId) -> AppResult<GalleryItem> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.gallery()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": { "approved": true } }, options)
            .await?
            .ok_or_else(|| AppError::not_found("Gallery item"))
    }

    pub async fn delete_gallery_item(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.gallery().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count == 1)
    }
}
