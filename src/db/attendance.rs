use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, is_duplicate_key, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::Attendance;

impl MongoDB {
    pub async fn check_in(&self, staff_id: &ObjectId, date: &str) -> AppResult<Attendance> {
        let mut record = Attendance {
            id: None,
            staff_id: *staff_id,
            date: date.to_string(),
            check_in: DateTime::now(),
            check_out: None,
            hours_worked: 0.0,
        };
        let result = self.attendance().insert_one(&record, None).await.map_err(|e| {
            if is_duplicate_key(&e) {
                AppError::conflict(format!("Already checked in on {}", date))
            } else {
                e.into()
            }
        })?;
        record.id = Some(inserted_id(&result)?);
        Ok(record)
    }

    pub async fn find_attendance(&self, staff_id: &ObjectId, date: &str) -> AppResult<Option<Attendance>> {
        Ok(self
            .attendance()
            .find_one(doc! { "staff_id": *staff_id, "date": date }, None)
            .await?)
    }

    /// Close an open record. Fails with a conflict if it was closed meanwhile.
    pub async fn check_out(&self, id: &ObjectId, check_out: DateTime, hours_worked: f64) -> AppResult<Attendance> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.attendance()
            .find_one_and_update(
                doc! { "_id": *id, "check_out": null },
                doc! { "$set": { "check_out": check_out, "hours_worked": hours_worked } },
                options,
            )
            .await?
            .ok_or_else(|| AppError::conflict("Already checked out"))
    }

    pub async fn list_attendance(
        &self,
        staff_id: Option<&ObjectId>,
        range: Option<(&str, &str)>,
    ) -> AppResult<Vec<Attendance>> {
        let mut filter = Document::new();
        if let Some(staff_id) = staff_id {
            filter.insert("staff_id", *staff_id);
        }
        if let Some((first, last)) = range {
            filter.insert("date", doc! { "$gte": first, "$lte": last });
        }
        let options = FindOptions::builder().sort(doc! { "date": 1 }).build();
        collect(self.attendance().find(filter, options).await?).await
    }
}
