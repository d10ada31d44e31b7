//! Booking persistence. Every status change is a compare-and-set on the
//! current status (plus any assignment fields the caller guards on), so two
//! concurrent requests cannot both move the same booking.

use std::collections::BTreeMap;

use futures::StreamExt;
use log::{info, warn};
use mongodb::{
    bson::{self, doc, oid::ObjectId, Document},
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};

use super::mongodb::{collect, inserted_id, with_updated_at, MongoDB};
use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingStatus, PaymentStatus};

/// Bookings in an active assignment state that name `staff_id` on either side.
pub fn active_assignment_filter(staff_id: &ObjectId) -> Document {
    doc! {
        "status": { "$in": BookingStatus::ACTIVE_ASSIGNMENT.to_vec() },
        "$or": [ { "driver_id": *staff_id }, { "guide_id": *staff_id } ],
    }
}

impl MongoDB {
    pub async fn create_booking(&self, mut booking: Booking) -> AppResult<Booking> {
        let result = self.bookings().insert_one(&booking, None).await?;
        booking.id = Some(inserted_id(&result)?);
        info!(
            "Booking {} created for package {}",
            booking.id.map(|id| id.to_hex()).unwrap_or_default(),
            booking.package_id.to_hex()
        );
        Ok(booking)
    }

    pub async fn find_booking(&self, id: &ObjectId) -> AppResult<Option<Booking>> {
        Ok(self.bookings().find_one(doc! { "_id": *id }, None).await?)
    }

    pub async fn find_booking_by_session(&self, session_id: &str) -> AppResult<Option<Booking>> {
        Ok(self
            .bookings()
            .find_one(doc! { "stripe_session_id": session_id }, None)
            .await?)
    }

    pub async fn list_bookings(&self, filter: Document) -> AppResult<Vec<Booking>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        collect(self.bookings().find(filter, options).await?).await
    }

    pub async fn user_bookings(&self, user_id: &ObjectId) -> AppResult<Vec<Booking>> {
        self.list_bookings(doc! { "user_id": *user_id }).await
    }

    pub async fn assigned_bookings(&self, staff_id: &ObjectId) -> AppResult<Vec<Booking>> {
        self.list_bookings(doc! {
            "$or": [ { "driver_id": *staff_id }, { "guide_id": *staff_id } ]
        })
        .await
    }

    /// Atomically move a booking from one of `from` to `to`, applying `set`.
    ///
    /// `guard` adds extra conditions to the filter. When nothing matches the
    /// booking is reloaded to tell a missing booking, an illegal transition
    /// and a lost race apart.
    pub async fn transition_booking(
        &self,
        id: &ObjectId,
        from: &[BookingStatus],
        to: BookingStatus,
        guard: Document,
        mut set: Document,
    ) -> AppResult<Booking> {
        let mut filter = doc! {
            "_id": *id,
            "status": { "$in": from.to_vec() },
        };
        for (key, value) in guard {
            filter.insert(key, value);
        }
        set.insert("status", to);

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        let updated = self
            .bookings()
            .find_one_and_update(filter, doc! { "$set": with_updated_at(set) }, options)
            .await?;

        match updated {
            Some(booking) => {
                info!("Booking {} moved to {}", id.to_hex(), to);
                Ok(booking)
            }
            None => {
                let current = self
                    .find_booking(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Booking"))?;
                if from.contains(&current.status) {
                    warn!("Booking {} changed concurrently while moving to {}", id.to_hex(), to);
                    Err(AppError::conflict(
                        "Booking was modified by another request, please reload and retry",
                    ))
                } else {
                    Err(AppError::InvalidTransition {
                        from: current.status.to_string(),
                        to: to.to_string(),
                    })
                }
            }
        }
    }

    /// Record the Stripe session for a booking that is still awaiting payment.
    pub async fn set_checkout_session(&self, id: &ObjectId, session_id: &str) -> AppResult<()> {
        let result = self
            .bookings()
            .update_one(
                doc! {
                    "_id": *id,
                    "status": BookingStatus::Pending,
                    "payment_status": PaymentStatus::Unpaid,
                },
                doc! { "$set": with_updated_at(doc! { "stripe_session_id": session_id }) },
                None,
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::conflict("Booking is no longer awaiting payment"));
        }
        Ok(())
    }

    /// Pending → Payment Confirmed. Repeated confirmations of a paid booking return it unchanged.
    pub async fn mark_booking_paid(&self, id: &ObjectId, payment_intent: Option<&str>) -> AppResult<Booking> {
        let current = self
            .find_booking(id)
            .await?
            .ok_or_else(|| AppError::not_found("Booking"))?;
        if current.payment_status == PaymentStatus::Paid {
            return Ok(current);
        }
        current.status.ensure_transition(BookingStatus::PaymentConfirmed)?;

        let mut set = doc! { "payment_status": PaymentStatus::Paid };
        if let Some(intent) = payment_intent {
            set.insert("payment_intent_id", intent);
        }
        match self
            .transition_booking(
                id,
                &[BookingStatus::Pending],
                BookingStatus::PaymentConfirmed,
                doc! { "payment_status": PaymentStatus::Unpaid },
                set,
            )
            .await
        {
            Ok(booking) => Ok(booking),
            // A concurrent webhook may have confirmed it first.
            Err(AppError::Conflict { .. }) | Err(AppError::InvalidTransition { .. }) => {
                let latest = self
                    .find_booking(id)
                    .await?
                    .ok_or_else(|| AppError::not_found("Booking"))?;
                if latest.payment_status == PaymentStatus::Paid {
                    Ok(latest)
                } else {
                    Err(AppError::InvalidTransition {
                        from: latest.status.to_string(),
                        to: BookingStatus::PaymentConfirmed.to_string(),
                    })
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn count_completed_trips(&self, staff_id: &ObjectId, first_day: &str, last_day: &str) -> AppResult<u64> {
        Ok(self
            .bookings()
            .count_documents(
                doc! {
                    "status": BookingStatus::Completed,
                    "$or": [ { "driver_id": *staff_id }, { "guide_id": *staff_id } ],
                    "end_date": { "$gte": first_day, "$lte": last_day },
                },
                None,
            )
            .await?)
    }

    pub async fn count_active_assignments(&self, staff_id: &ObjectId) -> AppResult<u64> {
        Ok(self
            .bookings()
            .count_documents(active_assignment_filter(staff_id), None)
            .await?)
    }

    pub async fn count_open_bookings_for_package(&self, package_id: &ObjectId) -> AppResult<u64> {
        let open: Vec<BookingStatus> = BookingStatus::ALL
            .into_iter()
            .filter(|s| !s.is_terminal())
            .collect();
        Ok(self
            .bookings()
            .count_documents(
                doc! { "package_id": *package_id, "status": { "$in": open } },
                None,
            )
            .await?)
    }

    pub async fn booking_status_counts(&self) -> AppResult<BTreeMap<String, u64>> {
        let pipeline = vec![doc! { "$group": { "_id": "$status", "count": { "$sum": 1 } } }];
        let mut cursor = self.bookings().aggregate(pipeline, None).await?;
        let mut counts: BTreeMap<String, u64> = BookingStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        while let Some(result) = cursor.next().await {
            let row = result?;
            if let Ok(status) = row.get_str("_id") {
                let count = match row.get("count") {
                    Some(bson::Bson::Int32(n)) => *n as u64,
                    Some(bson::Bson::Int64(n)) => *n as u64,
                    _ => 0,
                };
                counts.insert(status.to_string(), count);
            }
        }
        Ok(counts)
    }

    /// Sum of paid, non-cancelled booking totals.
    pub async fn paid_revenue(&self) -> AppResult<f64> {
        let pipeline = vec![
            doc! { "$match": {
                "payment_status": PaymentStatus::Paid,
                "status": { "$ne": BookingStatus::Cancelled },
            } },
            doc! { "$group": { "_id": bson::Bson::Null, "total": { "$sum": "$total_price" } } },
        ];
        let mut cursor = self.bookings().aggregate(pipeline, None).await?;
        match cursor.next().await {
            Some(result) => Ok(result?.get_f64("total").unwrap_or(0.0)),
            None => Ok(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_assignment_filter_covers_both_sides() {
        let staff_id = ObjectId::new();
        let filter = active_assignment_filter(&staff_id);

        let statuses = filter.get_document("status").unwrap().get_array("$in").unwrap();
        assert_eq!(statuses.len(), 2);
        assert!(statuses.contains(&bson::Bson::from(BookingStatus::StaffAssigned)));
        assert!(statuses.contains(&bson::Bson::from(BookingStatus::Confirmed)));

        let sides = filter.get_array("$or").unwrap();
        assert_eq!(sides.len(), 2);
        assert_eq!(sides[0].as_document().unwrap().get_object_id("driver_id").unwrap(), staff_id);
        assert_eq!(sides[1].as_document().unwrap().get_object_id("guide_id").unwrap(), staff_id);
    }
}
