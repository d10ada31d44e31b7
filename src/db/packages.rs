use mongodb::{
    bson::{doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, regex_escape, with_updated_at, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::Package;

impl MongoDB {
    pub async fn list_packages(&self, location: Option<&str>, include_inactive: bool) -> AppResult<Vec<Package>> {
        let mut filter = Document::new();
        if !include_inactive {
            filter.insert("active", true);
        }
        if let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) {
            filter.insert(
                "location",
                doc! { "$regex": regex_escape(location), "$options": "i" },
            );
        }
        let options = FindOptions::builder().sort(doc! { "title": 1 }).build();
        collect(self.packages().find(filter, options).await?).await
    }

    pub async fn find_package(&self, id: &ObjectId) -> AppResult<Option<Package>> {
        Ok(self.packages().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn create_package(&self, mut package: Package) -> AppResult<Package> {
        let result = self.packages().insert_one(&package, None).await?;
        package.id = Some(inserted_id(&result)?);
        Ok(package)
    }

    pub async fn update_package(&self, id: &ObjectId, set: Document) -> AppResult<Package> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.packages()
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": with_updated_at(set) }, options)
            .await?
            .ok_or_else(|| AppError::not_found("Package"))
    }

    pub async fn push_package_image(&self, id: &ObjectId, url: &str) -> AppResult<Package> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.packages()
            .find_one_and_update(
                doc! { "_id": *id },
                doc! {
                    "$push": { "images": url },
                    "$set": { "updated_at": mongodb::bson::DateTime::now() },
                },
                options,
            )
            .await?
            .ok_or_else(|| AppError::not_found("Package"))
    }

    pub async fn delete_package(&self, id: &ObjectId) -> AppResult<bool> {
        let result = self.packages().delete_one(doc! { "_id": *id }, None).await?;
        Ok(result.deleted_count == 1)
    }

    pub async fn count_packages(&self) -> AppResult<u64> {
        Ok(self.packages().count_documents(None, None).await?)
    }
}
