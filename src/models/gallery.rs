use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::format_datetime;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GalleryItem {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    #[serde(default)]
    pub package_id: Option<ObjectId>,
    pub image_url: String,
    pub display_url: String,
    pub delete_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub approved: bool,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UploadImageRequest {
    /// Base64 image data, optionally as a `data:image/...;base64,` URL.
    #[validate(length(min = 1, message = "Image data is required"))]
    pub image: String,
    #[validate(length(max = 300, message = "Caption is limited to 300 characters"))]
    pub caption: Option<String>,
    pub package_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub package_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct GalleryResponse {
    pub id: String,
    pub user_id: String,
    pub package_id: Option<String>,
    pub image_url: String,
    pub display_url: String,
    pub caption: Option<String>,
    pub approved: bool,
    pub created_at: String,
}

impl From<GalleryItem> for GalleryResponse {
    fn from(item: GalleryItem) -> Self {
        Self {
            id: item.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            user_id: item.user_id.to_hex(),
            package_id: item.package_id.map(|oid| oid.to_hex()),
            image_url: item.image_url,
            display_url: item.display_url,
            caption: item.caption,
            approved: item.approved,
            created_at: format_datetime(&item.created_at),
        }
    }
}
