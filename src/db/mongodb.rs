use futures::StreamExt;
use log::{info, warn};
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    error::{ErrorKind, WriteFailure},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Cursor, IndexModel,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};
use crate::models::{
    AdminAudit, Attendance, Booking, GalleryItem, Package, Payroll, PriceTier, Review, Staff, User,
};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db_name: String,
}

impl MongoDB {
    /// Builds the client; no connection is made until the first operation.
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, mongodb::error::Error> {
        let mut client_options = ClientOptions::parse(uri).await?;
        client_options.app_name = Some("safari-book".to_string());
        let client = Client::with_options(client_options)?;
        Ok(MongoDB {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn collection<T>(&self, name: &str) -> Collection<T> {
        self.client.database(&self.db_name).collection(name)
    }

    pub(crate) fn users(&self) -> Collection<User> {
        self.collection("users")
    }

    pub(crate) fn staff(&self) -> Collection<Staff> {
        self.collection("staff")
    }

    pub(crate) fn packages(&self) -> Collection<Package> {
        self.collection("packages")
    }

    pub(crate) fn bookings(&self) -> Collection<Booking> {
        self.collection("bookings")
    }

    pub(crate) fn gallery(&self) -> Collection<GalleryItem> {
        self.collection("gallery")
    }

    pub(crate) fn reviews(&self) -> Collection<Review> {
        self.collection("reviews")
    }

    pub(crate) fn attendance(&self) -> Collection<Attendance> {
        self.collection("attendance")
    }

    pub(crate) fn payroll(&self) -> Collection<Payroll> {
        self.collection("payroll")
    }

    pub(crate) fn audit(&self) -> Collection<AdminAudit> {
        self.collection("admin_audit")
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.client
            .database(&self.db_name)
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(IndexModel::builder().keys(doc! { "email": 1 }).options(unique()).build(), None)
            .await?;
        self.staff()
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).options(unique()).build(), None)
            .await?;
        self.bookings()
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1, "created_at": -1 }).build(), None)
            .await?;
        self.bookings()
            .create_index(IndexModel::builder().keys(doc! { "stripe_session_id": 1 }).build(), None)
            .await?;
        self.bookings()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "status": 1, "start_date": 1, "end_date": 1 })
                    .build(),
                None,
            )
            .await?;
        self.reviews()
            .create_index(IndexModel::builder().keys(doc! { "booking_id": 1 }).options(unique()).build(), None)
            .await?;
        self.attendance()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "staff_id": 1, "date": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.payroll()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "staff_id": 1, "month": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        self.audit()
            .create_index(IndexModel::builder().keys(doc! { "created_at": -1 }).build(), None)
            .await?;

        info!("MongoDB indexes ensured on {}", self.db_name);
        Ok(())
    }

    pub async fn seed_data(&self, force_seed: bool) -> AppResult<()> {
        let collection = self.packages();

        if force_seed {
            info!("Force seeding enabled. Clearing packages collection...");
            collection.delete_many(doc! {}, None).await?;
        }

        let count = collection.count_documents(None, None).await?;
        if count > 0 {
            return Ok(());
        }

        info!("Seeding sample safari packages...");
        let now = bson::DateTime::now();
        let tier = |min_people, max_people, price_per_person| PriceTier {
            min_people,
            max_people,
            price_per_person,
        };
        let package = |title: &str,
                       location: &str,
                       description: &str,
                       duration_days: i32,
                       base_price: f64,
                       price_tiers: Vec<PriceTier>,
                       guide_fee_per_day: f64,
                       highlights: &[&str]| Package {
            id: None,
            title: title.to_string(),
            description: description.to_string(),
            location: location.to_string(),
            duration_days,
            base_price,
            price_tiers,
            guide_fee_per_day,
            max_group_size: 8,
            highlights: highlights.iter().map(|h| h.to_string()).collect(),
            images: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        };

        let samples = vec![
            package(
                "Yala Leopard Trail",
                "Yala",
                "Morning and evening game drives through Block 1 of Yala National Park.",
                2,
                220.0,
                vec![tier(1, 2, 200.0), tier(3, 5, 170.0), tier(6, 8, 150.0)],
                35.0,
                &["Leopard tracking", "Sloth bears", "Coastal lagoons"],
            ),
            package(
                "Udawalawe Elephant Safari",
                "Udawalawe",
                "Half-day jeep safari with a stop at the Elephant Transit Home.",
                1,
                90.0,
                vec![tier(1, 3, 85.0), tier(4, 8, 70.0)],
                20.0,
                &["Elephant herds", "Elephant Transit Home feeding"],
            ),
            package(
                "Wilpattu Lakes Expedition",
                "Wilpattu",
                "Three days among the natural lakes (villus) of Sri Lanka's largest park.",
                3,
                380.0,
                vec![tier(1, 2, 360.0), tier(3, 8, 300.0)],
                40.0,
                &["Villu lakes", "Leopards and sloth bears", "Campfire dinner"],
            ),
            package(
                "Minneriya Elephant Gathering",
                "Minneriya",
                "Evening drive timed for the dry-season gathering around Minneriya tank.",
                1,
                75.0,
                vec![],
                15.0,
                &["The Gathering", "Birdlife on the tank"],
            ),
            package(
                "Kumana Birding Safari",
                "Kumana",
                "Two days in the Kumana bird sanctuary with a specialist guide.",
                2,
                190.0,
                vec![tier(1, 4, 180.0), tier(5, 8, 160.0)],
                30.0,
                &["Kumana Villu", "Migratory waders", "Painted storks"],
            ),
        ];

        let total = samples.len();
        collection.insert_many(samples, None).await?;
        info!("Seeding complete with {} packages", total);
        Ok(())
    }
}

pub fn string_to_id(id: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(id.trim()).map_err(|_| AppError::validation(format!("'{}' is not a valid id", id)))
}

pub(crate) async fn collect<T>(mut cursor: Cursor<T>) -> AppResult<Vec<T>>
where
    T: DeserializeOwned + Unpin + Send + Sync,
{
    let mut items = Vec::new();
    while let Some(result) = cursor.next().await {
        items.push(result?);
    }
    Ok(items)
}

pub(crate) fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

pub(crate) fn inserted_id(result: &mongodb::results::InsertOneResult) -> AppResult<ObjectId> {
    result.inserted_id.as_object_id().ok_or_else(|| {
        warn!("Insert returned a non-ObjectId id: {:?}", result.inserted_id);
        AppError::Internal("inserted id is not an ObjectId".into())
    })
}

/// Escape user text for use inside a `$regex`.
pub(crate) fn regex_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub(crate) fn with_updated_at(mut set: Document) -> Document {
    set.insert("updated_at", bson::DateTime::now());
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert_eq!(regex_escape("Yala (Block 1)"), "Yala \\(Block 1\\)");
        assert_eq!(regex_escape("a.b*"), "a\\.b\\*");
    }

    #[test]
    fn ids_are_validated() {
        assert!(string_to_id("6530c0ffee6530c0ffee6530").is_ok());
        assert!(matches!(string_to_id("nope"), Err(AppError::Validation { .. })));
    }
}
