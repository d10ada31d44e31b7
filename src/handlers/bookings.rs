use actix_web::{web, HttpResponse};
use chrono::Utc;
use log::info;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime};

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    dates::{format_date, parse_date, trip_end},
    AssignStaffRequest, Booking, BookingQuery, BookingResponse, BookingStatus,
    CancelRequest, CreateBookingRequest, PaymentStatus, RespondRequest, Role,
};
use crate::state::AppState;

fn today() -> String {
    format_date(Utc::now().date_naive())
}

fn responses(bookings: Vec<Booking>) -> Vec<BookingResponse> {
    bookings.into_iter().map(BookingResponse::from).collect()
}

async fn load_booking(state: &AppState, id: &ObjectId) -> AppResult<Booking> {
    state
        .db
        .find_booking(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))
}

/// Owners, assigned staff and admins may see a booking.
fn can_view(user: &AuthUser, booking: &Booking) -> bool {
    user.is_admin() || booking.user_id == user.user_id || booking.assignment_of(&user.user_id).is_some()
}

pub async fn create_booking(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<CreateBookingRequest>,
) -> AppResult<HttpResponse> {
    user.require_role(&[Role::Customer])?;
    validate_request(&*body)?;
    let body = body.into_inner();

    let package_id = string_to_id(&body.package_id)?;
    let package = state
        .db
        .find_package(&package_id)
        .await?
        .filter(|p| p.active)
        .ok_or_else(|| AppError::not_found("Package"))?;

    let start = parse_date(&body.start_date)?;
    if start < Utc::now().date_naive() {
        return Err(AppError::validation("Start date cannot be in the past"));
    }
    let quote = package.quote(body.adults, body.children, body.needs_guide)?;

    let now = DateTime::now();
    let booking = state
        .db
        .create_booking(Booking {
            id: None,
            user_id: user.user_id,
            package_id,
            package_title: package.title.clone(),
            start_date: format_date(start),
            end_date: format_date(trip_end(start, package.duration_days)),
            adults: body.adults,
            children: body.children,
            needs_guide: body.needs_guide,
            pickup_location: body.pickup_location.trim().to_string(),
            special_requests: body.special_requests.filter(|s| !s.trim().is_empty()),
            total_price: quote.total_price,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Unpaid,
            stripe_session_id: None,
            payment_intent_id: None,
            driver_id: None,
            guide_id: None,
            driver_accepted: false,
            guide_accepted: false,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        })
        .await?;

    Ok(HttpResponse::Created().json(BookingResponse::from(booking)))
}

pub async fn my_bookings(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    let bookings = state.db.user_bookings(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(responses(bookings)))
}

pub async fn assigned_bookings(state: web::Data<AppState>, user: AuthUser) -> AppResult<HttpResponse> {
    user.require_role(&[Role::Driver, Role::Guide])?;
    let bookings = state.db.assigned_bookings(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(responses(bookings)))
}

pub async fn list_bookings(
    state: web::Data<AppState>,
    user: AuthUser,
    query: web::Query<BookingQuery>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let filter = match query.status.as_deref() {
        Some(raw) => {
            let status = BookingStatus::parse(raw)
                .ok_or_else(|| AppError::validation(format!("Unknown booking status '{}'", raw)))?;
            doc! { "status": status }
        }
        None => doc! {},
    };
    let bookings = state.db.list_bookings(filter).await?;
    Ok(HttpResponse::Ok().json(responses(bookings)))
}

pub async fn get_booking(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = string_to_id(&path)?;
    let booking = load_booking(&state, &id).await?;
    if !can_view(&user, &booking) {
        return Err(AppError::Forbidden);
    }
    Ok(HttpResponse::Ok().json(BookingResponse::from(booking)))
}

/// The staff member must hold `role` and have an available profile.
async fn check_assignable(state: &AppState, user_id: &ObjectId, role: Role) -> AppResult<()> {
    let account = state
        .db
        .find_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("{}", role)))?;
    if account.role != role {
        return Err(AppError::validation(format!("{} is not a {}", account.name, role)));
    }
    let profile = state
        .db
        .find_staff(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Staff profile"))?;
    if !profile.available {
        return Err(AppError::conflict(format!("{} is not available", account.name)));
    }
    Ok(())
}

pub async fn assign_staff(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<AssignStaffRequest>,
) -> AppResult<HttpResponse> {
    user.require_admin()?;
    let id = string_to_id(&path)?;
    let booking = load_booking(&state, &id).await?;
    booking.status.ensure_transition(BookingStatus::StaffAssigned)?;

    let driver_id = string_to_id(&body.driver_id)?;
    let guide_id = body.guide_id.as_deref().map(string_to_id).transpose()?;
    booking.check_crew(&driver_id, guide_id.as_ref())?;

    check_assignable(&state, &driver_id, Role::Driver).await?;
    if let Some(guide_id) = guide_id.as_ref() {
        check_assignable(&state, guide_id, Role::Guide).await?;
    }

    let busy = state
        .db
        .busy_staff_ids(&booking.start_date, &booking.end_date, Some(&id))
        .await?;
    if busy.contains(&driver_id) {
        return Err(AppError::conflict("Driver already has a trip on these dates"));
    }
    if guide_id.map_or(false, |g| busy.contains(&g)) {
        return Err(AppError::conflict("Guide already has a trip on these dates"));
    }

    let updated = state
        .db
        .transition_booking(
            &id,
            &[BookingStatus::PaymentConfirmed, BookingStatus::StaffAssigned],
            BookingStatus::StaffAssigned,
            doc! {},
            doc! {
                "driver_id": driver_id,
                "guide_id": guide_id.map(Bson::ObjectId).unwrap_or(Bson::Null),
                "driver_accepted": false,
                "guide_accepted": false,
            },
        )
        .await?;

    state
        .db
        .record_audit(
            &user.user_id,
            "assign_staff",
            "bookings",
            Some(id),
            format!(
                "driver {} guide {}",
                driver_id.to_hex(),
                guide_id.map(|g| g.to_hex()).unwrap_or_else(|| "-".into())
            ),
        )
        .await;
    Ok(HttpResponse::Ok().json(BookingResponse::from(updated)))
}

pub async fn respond_to_assignment(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: web::Json<RespondRequest>,
) -> AppResult<HttpResponse> {
    user.require_role(&[Role::Driver, Role::Guide])?;
    let id = string_to_id(&path)?;
    let booking = load_booking(&state, &id).await?;
    let assignment = booking
        .assignment_of(&user.user_id)
        .ok_or(AppError::Forbidden)?;

    if !body.accept {
        booking.status.ensure_transition(BookingStatus::PaymentConfirmed)?;
        let updated = state
            .db
            .transition_booking(
                &id,
                &[BookingStatus::StaffAssigned],
                BookingStatus::PaymentConfirmed,
                doc! { assignment.id_field(): user.user_id },
                assignment.decline_update(),
            )
            .await?;
        info!("{:?} {} declined booking {}", assignment, user.user_id.to_hex(), id.to_hex());
        return Ok(HttpResponse::Ok().json(BookingResponse::from(updated)));
    }

    if booking.status != BookingStatus::StaffAssigned {
        return Err(AppError::InvalidTransition {
            from: booking.status.to_string(),
            to: BookingStatus::Confirmed.to_string(),
        });
    }
    let accepted = if booking.has_accepted(assignment) {
        booking
    } else {
        state
            .db
            .transition_booking(
                &id,
                &[BookingStatus::StaffAssigned],
                BookingStatus::StaffAssigned,
                doc! { assignment.id_field(): user.user_id, assignment.accepted_field(): false },
                doc! { assignment.accepted_field(): true },
            )
            .await?
    };

    if !accepted.ready_to_confirm() {
        return Ok(HttpResponse::Ok().json(BookingResponse::from(accepted)));
    }

    let confirmed = state
        .db
        .transition_booking(
            &id,
            &[BookingStatus::StaffAssigned],
            BookingStatus::Confirmed,
            doc! {
                "driver_id": { "$ne": Bson::Null },
                "driver_accepted": true,
                "$or": [ { "needs_guide": false }, { "guide_accepted": true } ],
            },
            doc! {},
        )
        .await;
    let confirmed = match confirmed {
        Ok(booking) => booking,
        // The other party's acceptance may have confirmed it first.
        Err(AppError::InvalidTransition { .. }) | Err(AppError::Conflict { .. }) => {
            let latest = load_booking(&state, &id).await?;
            if latest.status != BookingStatus::Confirmed {
                return Err(AppError::conflict(
                    "Booking was modified by another request, please reload and retry",
                ));
            }
            latest
        }
        Err(e) => return Err(e),
    };
    Ok(HttpResponse::Ok().json(BookingResponse::from(confirmed)))
}

pub async fn complete_booking(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let id = string_to_id(&path)?;
    let booking = load_booking(&state, &id).await?;
    let is_driver = booking.driver_id == Some(user.user_id);
    if !user.is_admin() && !is_driver {
        return Err(AppError::Forbidden);
    }
    booking.status.ensure_transition(BookingStatus::Completed)?;
    if booking.start_date > today() {
        return Err(AppError::validation("The trip has not started yet"));
    }

    let updated = state
        .db
        .transition_booking(
            &id,
            &[BookingStatus::Confirmed],
            BookingStatus::Completed,
            doc! {},
            doc! {},
        )
        .await?;
    if user.is_admin() {
        state
            .db
            .record_audit(&user.user_id, "complete_booking", "bookings", Some(id), "marked completed")
            .await;
    }
    Ok(HttpResponse::Ok().json(BookingResponse::from(updated)))
}

pub async fn cancel_booking(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
    body: Option<web::Json<CancelRequest>>,
) -> AppResult<HttpResponse> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    validate_request(&body)?;
    let id = string_to_id(&path)?;
    let booking = load_booking(&state, &id).await?;

    if !user.is_admin() {
        if booking.user_id != user.user_id {
            return Err(AppError::Forbidden);
        }
        if booking.status == BookingStatus::Confirmed && booking.start_date <= today() {
            return Err(AppError::validation(
                "Trips that have already started can only be cancelled by an administrator",
            ));
        }
    }
    booking.status.ensure_transition(BookingStatus::Cancelled)?;

    let payment_status = booking.payment_status_after_cancel();
    let reason = body
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let updated = state
        .db
        .transition_booking(
            &id,
            &BookingStatus::sources_of(BookingStatus::Cancelled),
            BookingStatus::Cancelled,
            doc! { "payment_status": booking.payment_status },
            doc! {
                "payment_status": payment_status,
                "cancellation_reason": reason.clone().map(Bson::String).unwrap_or(Bson::Null),
            },
        )
        .await?;

    if user.is_admin() {
        state
            .db
            .record_audit(
                &user.user_id,
                "cancel_booking",
                "bookings",
                Some(id),
                reason.unwrap_or_else(|| "no reason given".into()),
            )
            .await;
    }
    Ok(HttpResponse::Ok().json(BookingResponse::from(updated)))
}
