use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReplaceOptions, ReturnDocument},
};

use super::mongodb::{collect, is_duplicate_key, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::{Payroll, PayrollStatus};

impl MongoDB {
    /// Insert or replace the draft payroll for `(staff_id, month)`. A paid record is never replaced.
    pub async fn upsert_payroll(&self, payroll: &Payroll) -> AppResult<Payroll> {
        let filter = doc! {
            "staff_id": payroll.staff_id,
            "month": payroll.month.as_str(),
            "status": PayrollStatus::Draft,
        };
        let options = ReplaceOptions::builder().upsert(true).build();
        self.payroll()
            .replace_one(filter, payroll, options)
            .await
            .map_err(|e| {
                if is_duplicate_key(&e) {
                    AppError::conflict(format!("Payroll for {} is already paid", payroll.month))
                } else {
                    e.into()
                }
            })?;

        self.find_payroll_for(&payroll.staff_id, &payroll.month)
            .await?
            .ok_or_else(|| AppError::Internal("payroll missing after upsert".into()))
    }

    pub async fn find_payroll(&self, id: &ObjectId) -> AppResult<Option<Payroll>> {
        Ok(self.payroll().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn find_payroll_for(&self, staff_id: &ObjectId, month: &str) -> AppResult<Option<Payroll>> {
        Ok(self
            .payroll()
            .find_one(doc! { "staff_id": *staff_id, "month": month }, None)
            .await?)
    }

    pub async fn list_payroll(&self, staff_id: Option<&ObjectId>, month: Option<&str>) -> AppResult<Vec<Payroll>> {
        let mut filter = Document::new();
        if let Some(staff_id) = staff_id {
            filter.insert("staff_id", *staff_id);
        }
        if let Some(month) = month {
            filter.insert("month", month);
        }
        let options = FindOptions::builder()
            .sort(doc! { "month": -1, "generated_at": -1 })
            .build();
        collect(self.payroll().find(filter, options).await?).await
    }

    /// Draft → Paid.
    pub async fn mark_payroll_paid(&self, id: &ObjectId) -> AppResult<Payroll> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .payroll()
            .find_one_and_update(
                doc! { "_id": *id, "status": PayrollStatus::Draft },
                doc! { "$set": { "status": PayrollStatus::Paid, "paid_at": DateTime::now() } },
                options,
            )
            .await?;
        match updated {
            Some(payroll) => Ok(payroll),
            None if self.find_payroll(id).await?.is_some() => {
                Err(AppError::conflict("Payroll is already paid"))
            }
            None => Err(AppError::not_found("Payroll")),
        }
    }
}
