//! Booking documents and the status state machine.
//!
//! ```text
//! Pending ──pay──▶ Payment Confirmed ──assign──▶ Driver/Guide Assigned ──accept──▶ Confirmed ──▶ Completed
//!    │                    ▲  │                      │   │  ▲ (reassign)             │
//!    │                    │  │                      │   └──┘                        │
//!    │                    └──┼──────decline─────────┘                               │
//!    └───────────────────────┴──────────────▶ Cancelled ◀───────────────────────────┘
//! ```

use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::format_datetime;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "Payment Confirmed")]
    PaymentConfirmed,
    #[serde(rename = "Driver/Guide Assigned")]
    StaffAssigned,
    #[serde(rename = "Confirmed")]
    Confirmed,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Cancelled")]
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::PaymentConfirmed,
        BookingStatus::StaffAssigned,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    /// Statuses in which assigned staff are committed to the trip dates.
    pub const ACTIVE_ASSIGNMENT: [BookingStatus; 2] =
        [BookingStatus::StaffAssigned, BookingStatus::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::PaymentConfirmed => "Payment Confirmed",
            BookingStatus::StaffAssigned => "Driver/Guide Assigned",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        match (self, next) {
            (_, Cancelled) => !self.is_terminal(),
            (Pending, PaymentConfirmed) => true,
            (PaymentConfirmed, StaffAssigned) => true,
            (StaffAssigned, StaffAssigned) => true,
            (StaffAssigned, PaymentConfirmed) => true,
            (StaffAssigned, Confirmed) => true,
            (Confirmed, Completed) => true,
            _ => false,
        }
    }

    /// All statuses from which `next` is reachable in one step.
    pub fn sources_of(next: BookingStatus) -> Vec<BookingStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }

    pub fn ensure_transition(&self, next: BookingStatus) -> AppResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(AppError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<BookingStatus> for Bson {
    fn from(status: BookingStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[serde(rename = "Unpaid")]
    Unpaid,
    #[serde(rename = "Paid")]
    Paid,
    #[serde(rename = "Refund Pending")]
    RefundPending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "Unpaid",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::RefundPending => "Refund Pending",
        }
    }
}

impl From<PaymentStatus> for Bson {
    fn from(status: PaymentStatus) -> Self {
        Bson::String(status.as_str().to_string())
    }
}

/// Which side of a trip a staff member is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    Driver,
    Guide,
}

impl Assignment {
    pub fn id_field(&self) -> &'static str {
        match self {
            Assignment::Driver => "driver_id",
            Assignment::Guide => "guide_id",
        }
    }

    pub fn accepted_field(&self) -> &'static str {
        match self {
            Assignment::Driver => "driver_accepted",
            Assignment::Guide => "guide_accepted",
        }
    }

    /// Fields cleared when this side declines. The other side is untouched.
    pub fn decline_update(&self) -> Document {
        doc! { self.id_field(): Bson::Null, self.accepted_field(): false }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Booking {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub package_id: ObjectId,
    pub package_title: String,
    pub start_date: String,
    pub end_date: String,
    pub adults: i32,
    pub children: i32,
    pub needs_guide: bool,
    pub pickup_location: String,
    #[serde(default)]
    pub special_requests: Option<String>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    #[serde(default)]
    pub stripe_session_id: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    #[serde(default)]
    pub driver_id: Option<ObjectId>,
    #[serde(default)]
    pub guide_id: Option<ObjectId>,
    #[serde(default)]
    pub driver_accepted: bool,
    #[serde(default)]
    pub guide_accepted: bool,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Booking {
    /// Which assignment `user_id` holds on this booking, if any.
    pub fn assignment_of(&self, user_id: &ObjectId) -> Option<Assignment> {
        if self.driver_id.as_ref() == Some(user_id) {
            Some(Assignment::Driver)
        } else if self.guide_id.as_ref() == Some(user_id) {
            Some(Assignment::Guide)
        } else {
            None
        }
    }

    /// A trip can be confirmed once every required staff member has accepted.
    pub fn ready_to_confirm(&self) -> bool {
        self.driver_id.is_some()
            && self.driver_accepted
            && (!self.needs_guide || (self.guide_id.is_some() && self.guide_accepted))
    }

    pub fn has_accepted(&self, assignment: Assignment) -> bool {
        match assignment {
            Assignment::Driver => self.driver_accepted,
            Assignment::Guide => self.guide_accepted,
        }
    }

    /// Checks a proposed crew against what the booking asked for.
    pub fn check_crew(&self, driver_id: &ObjectId, guide_id: Option<&ObjectId>) -> AppResult<()> {
        match (self.needs_guide, guide_id) {
            (true, None) => return Err(AppError::validation("This booking needs a guide")),
            (false, Some(_)) => {
                return Err(AppError::validation("This booking did not request a guide"))
            }
            _ => {}
        }
        if guide_id == Some(driver_id) {
            return Err(AppError::validation("Driver and guide must be different people"));
        }
        Ok(())
    }

    /// Payment status a booking carries once cancelled.
    pub fn payment_status_after_cancel(&self) -> PaymentStatus {
        match self.payment_status {
            PaymentStatus::Paid => PaymentStatus::RefundPending,
            other => other,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateBookingRequest {
    pub package_id: String,
    pub start_date: String,
    #[validate(range(min = 1, max = 100, message = "At least one adult is required"))]
    pub adults: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "Children cannot be negative"))]
    pub children: i32,
    #[serde(default)]
    pub needs_guide: bool,
    #[validate(length(min = 2, max = 200, message = "Pickup location is required"))]
    pub pickup_location: String,
    #[validate(length(max = 1000, message = "Special requests are limited to 1000 characters"))]
    pub special_requests: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AssignStaffRequest {
    pub driver_id: String,
    pub guide_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Debug, Serialize, Deserialize, Default, Validate)]
pub struct CancelRequest {
    #[validate(length(max = 500, message = "Reason is limited to 500 characters"))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookingQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct ConfirmPaymentRequest {
    #[validate(length(min = 1, max = 255, message = "Session id is required"))]
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
pub struct BookingResponse {
    pub id: String,
    pub user_id: String,
    pub package_id: String,
    pub package_title: String,
    pub start_date: String,
    pub end_date: String,
    pub adults: i32,
    pub children: i32,
    pub needs_guide: bool,
    pub pickup_location: String,
    pub special_requests: Option<String>,
    pub total_price: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub driver_id: Option<String>,
    pub guide_id: Option<String>,
    pub driver_accepted: bool,
    pub guide_accepted: bool,
    pub cancellation_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Booking> for BookingResponse {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            user_id: b.user_id.to_hex(),
            package_id: b.package_id.to_hex(),
            package_title: b.package_title,
            start_date: b.start_date,
            end_date: b.end_date,
            adults: b.adults,
            children: b.children,
            needs_guide: b.needs_guide,
            pickup_location: b.pickup_location,
            special_requests: b.special_requests,
            total_price: b.total_price,
            status: b.status,
            payment_status: b.payment_status,
            driver_id: b.driver_id.map(|oid| oid.to_hex()),
            guide_id: b.guide_id.map(|oid| oid.to_hex()),
            driver_accepted: b.driver_accepted,
            guide_accepted: b.guide_accepted,
            cancellation_reason: b.cancellation_reason,
            created_at: format_datetime(&b.created_at),
            updated_at: format_datetime(&b.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    fn booking(needs_guide: bool) -> Booking {
        Booking {
            id: Some(ObjectId::new()),
            user_id: ObjectId::new(),
            package_id: ObjectId::new(),
            package_title: "Wilpattu Day Safari".into(),
            start_date: "2026-11-02".into(),
            end_date: "2026-11-02".into(),
            adults: 2,
            children: 0,
            needs_guide,
            pickup_location: "Anuradhapura".into(),
            special_requests: None,
            total_price: 240.0,
            status: StaffAssigned,
            payment_status: PaymentStatus::Paid,
            stripe_session_id: None,
            payment_intent_id: None,
            driver_id: Some(ObjectId::new()),
            guide_id: None,
            driver_accepted: false,
            guide_accepted: false,
            cancellation_reason: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn happy_path_is_allowed() {
        assert!(Pending.can_transition_to(PaymentConfirmed));
        assert!(PaymentConfirmed.can_transition_to(StaffAssigned));
        assert!(StaffAssigned.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
    }

    #[test]
    fn skipping_steps_is_rejected() {
        assert!(!Pending.can_transition_to(StaffAssigned));
        assert!(!Pending.can_transition_to(Confirmed));
        assert!(!PaymentConfirmed.can_transition_to(Confirmed));
        assert!(!StaffAssigned.can_transition_to(Completed));
        let err = Pending.ensure_transition(Completed).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_states_are_final() {
        for next in BookingStatus::ALL {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn cancellation_sources() {
        assert_eq!(
            BookingStatus::sources_of(Cancelled),
            vec![Pending, PaymentConfirmed, StaffAssigned, Confirmed]
        );
        assert_eq!(BookingStatus::sources_of(Confirmed), vec![StaffAssigned]);
    }

    #[test]
    fn status_strings_match_stored_values() {
        assert_eq!(
            serde_json::to_string(&StaffAssigned).unwrap(),
            "\"Driver/Guide Assigned\""
        );
        assert_eq!(BookingStatus::parse("payment confirmed"), Some(PaymentConfirmed));
        assert_eq!(BookingStatus::parse("Shipped"), None);
    }

    #[test]
    fn confirmation_needs_every_acceptance() {
        let mut b = booking(false);
        assert!(!b.ready_to_confirm());
        b.driver_accepted = true;
        assert!(b.ready_to_confirm());

        let mut guided = booking(true);
        guided.driver_accepted = true;
        assert!(!guided.ready_to_confirm());
        guided.guide_id = Some(ObjectId::new());
        guided.guide_accepted = true;
        assert!(guided.ready_to_confirm());
    }

    #[test]
    fn assignment_is_resolved_by_id() {
        let mut b = booking(true);
        let guide = ObjectId::new();
        b.guide_id = Some(guide);
        let driver = b.driver_id.unwrap();
        assert_eq!(b.assignment_of(&driver), Some(Assignment::Driver));
        assert_eq!(b.assignment_of(&guide), Some(Assignment::Guide));
        assert_eq!(b.assignment_of(&ObjectId::new()), None);
    }

    #[test]
    fn crew_must_match_the_booking() {
        let driver = ObjectId::new();
        let guide = ObjectId::new();

        let guided = booking(true);
        assert!(guided.check_crew(&driver, Some(&guide)).is_ok());
        assert!(matches!(
            guided.check_crew(&driver, None),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            guided.check_crew(&driver, Some(&driver)),
            Err(AppError::Validation { .. })
        ));

        let unguided = booking(false);
        assert!(unguided.check_crew(&driver, None).is_ok());
        assert!(matches!(
            unguided.check_crew(&driver, Some(&guide)),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn cancelling_a_paid_booking_owes_a_refund() {
        let mut b = booking(false);
        assert_eq!(b.payment_status_after_cancel(), PaymentStatus::RefundPending);
        b.payment_status = PaymentStatus::Unpaid;
        assert_eq!(b.payment_status_after_cancel(), PaymentStatus::Unpaid);
        b.payment_status = PaymentStatus::RefundPending;
        assert_eq!(b.payment_status_after_cancel(), PaymentStatus::RefundPending);
    }

    #[test]
    fn decline_clears_only_the_declining_side() {
        assert!(StaffAssigned.can_transition_to(PaymentConfirmed));

        let update = Assignment::Guide.decline_update();
        assert_eq!(update.len(), 2);
        assert_eq!(update.get("guide_id"), Some(&Bson::Null));
        assert_eq!(update.get_bool("guide_accepted").unwrap(), false);
        assert!(!update.contains_key("driver_id"));
        assert!(!update.contains_key("driver_accepted"));

        let update = Assignment::Driver.decline_update();
        assert_eq!(update.get("driver_id"), Some(&Bson::Null));
        assert!(!update.contains_key("guide_id"));
    }

    #[test]
    fn acceptance_is_tracked_per_side() {
        let mut b = booking(true);
        b.guide_accepted = true;
        assert!(!b.has_accepted(Assignment::Driver));
        assert!(b.has_accepted(Assignment::Guide));
    }
}
