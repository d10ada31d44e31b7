use mongodb::bson::{oid::ObjectId, DateTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{format_datetime, round2};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Review {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub user_name: String,
    pub package_id: ObjectId,
    pub booking_id: ObjectId,
    pub rating: i32,
    pub comment: String,
    pub created_at: DateTime,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateReviewRequest {
    pub booking_id: String,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 3, max = 2000, message = "Comment must be 3-2000 characters"))]
    pub comment: String,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct ReviewResponse {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub package_id: String,
    pub booking_id: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: String,
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: r.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            user_id: r.user_id.to_hex(),
            user_name: r.user_name,
            package_id: r.package_id.to_hex(),
            booking_id: r.booking_id.to_hex(),
            rating: r.rating,
            comment: r.comment,
            created_at: format_datetime(&r.created_at),
        }
    }
}

#[derive(Serialize)]
pub struct PackageReviews {
    pub average_rating: f64,
    pub count: usize,
    pub reviews: Vec<ReviewResponse>,
}

impl PackageReviews {
    pub fn new(reviews: Vec<Review>) -> Self {
        let count = reviews.len();
        let average_rating = if count == 0 {
            0.0
        } else {
            let total: i64 = reviews.iter().map(|r| i64::from(r.rating)).sum();
            round2(total as f64 / count as f64)
        };
        Self {
            average_rating,
            count,
            reviews: reviews.into_iter().map(ReviewResponse::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(rating: i32) -> Review {
        Review {
            id: Some(ObjectId::new()),
            user_id: ObjectId::new(),
            user_name: "Nimali".into(),
            package_id: ObjectId::new(),
            booking_id: ObjectId::new(),
            rating,
            comment: "Saw three leopards".into(),
            created_at: DateTime::now(),
        }
    }

    #[test]
    fn average_is_rounded() {
        let summary = PackageReviews::new(vec![review(5), review(4), review(4)]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average_rating, 4.33);
    }

    #[test]
    fn empty_average_is_zero() {
        let summary = PackageReviews::new(vec![]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average_rating, 0.0);
    }
}
