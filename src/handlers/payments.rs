use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;

use crate::auth::AuthUser;
use crate::db::string_to_id;
use crate::error::{validate_request, AppError, AppResult};
use crate::models::{
    BookingResponse, BookingStatus, CheckoutResponse, ConfirmPaymentRequest, PaymentStatus,
};
use crate::services::{stripe::verify_webhook_signature, CheckoutItem, CheckoutSession, WebhookEvent};
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

pub async fn create_checkout(
    state: web::Data<AppState>,
    user: AuthUser,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let booking_id = string_to_id(&path)?;
    let booking = state
        .db
        .find_booking(&booking_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking"))?;
    if booking.user_id != user.user_id {
        return Err(AppError::Forbidden);
    }
    if booking.status != BookingStatus::Pending || booking.payment_status != PaymentStatus::Unpaid {
        return Err(AppError::conflict("Booking is no longer awaiting payment"));
    }

    let customer = state
        .db
        .find_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let frontend = state.config.frontend_url.trim_end_matches('/');
    let item = CheckoutItem {
        booking_id: booking_id.to_hex(),
        name: booking.package_title.clone(),
        description: format!(
            "{} to {}, {} adults, {} children{}",
            booking.start_date,
            booking.end_date,
            booking.adults,
            booking.children,
            if booking.needs_guide { ", with guide" } else { "" }
        ),
        amount: booking.total_price,
        customer_email: customer.email,
        success_url: format!("{}/payment/success?session_id={{CHECKOUT_SESSION_ID}}", frontend),
        cancel_url: format!("{}/bookings/{}", frontend, booking_id.to_hex()),
    };

    let session = state.stripe.create_checkout_session(&item).await?;
    state.db.set_checkout_session(&booking_id, &session.id).await?;

    Ok(HttpResponse::Ok().json(CheckoutResponse {
        session_id: session.id,
        url: session.url,
    }))
}

pub async fn confirm_payment(
    state: web::Data<AppState>,
    user: AuthUser,
    body: web::Json<ConfirmPaymentRequest>,
) -> AppResult<HttpResponse> {
    validate_request(&*body)?;
    let booking = state
        .db
        .find_booking_by_session(&body.session_id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking for this session"))?;
    if booking.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden);
    }
    let booking_id = booking
        .id
        .ok_or_else(|| AppError::Internal("booking document missing id".into()))?;

    let session = state.stripe.retrieve_checkout_session(&body.session_id).await?;
    if session.booking_id() != Some(booking_id.to_hex().as_str()) {
        warn!(
            "Checkout session {} does not belong to booking {}",
            session.id,
            booking_id.to_hex()
        );
        return Err(AppError::conflict("Checkout session does not match this booking"));
    }
    if !session.is_paid() {
        return Err(AppError::Payment {
            message: "Payment has not been completed".into(),
        });
    }
    if !session.covers(booking.total_price) {
        warn!(
            "Checkout session {} charged {:?}, booking {} totals {:.2}",
            session.id,
            session.amount_total,
            booking_id.to_hex(),
            booking.total_price
        );
        return Err(AppError::Payment {
            message: "Amount paid does not cover the booking total".into(),
        });
    }

    let updated = state
        .db
        .mark_booking_paid(&booking_id, session.payment_intent.as_deref())
        .await?;
    Ok(HttpResponse::Ok().json(BookingResponse::from(updated)))
}

/// Stripe's webhook. Events that cannot be applied to a booking are logged
/// and acknowledged; storage failures answer 500 so Stripe retries.
pub async fn stripe_webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Bytes,
) -> AppResult<HttpResponse> {
    let signed = match state.config.stripe.webhook_secret.as_deref() {
        Some(secret) => {
            let header = req
                .headers()
                .get(SIGNATURE_HEADER)
                .and_then(|h| h.to_str().ok())
                .ok_or(AppError::Unauthorized)?;
            verify_webhook_signature(&payload, header, secret, Utc::now().timestamp())
                .map_err(|_| AppError::Unauthorized)?;
            true
        }
        None => {
            warn!("STRIPE_WEBHOOK_SECRET not set, re-checking webhook sessions with Stripe");
            false
        }
    };

    let event: WebhookEvent = serde_json::from_slice(&payload)
        .map_err(|e| AppError::validation(format!("Malformed webhook payload: {}", e)))?;
    info!("Stripe event {} ({})", event.id, event.event_type);

    match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let mut session: CheckoutSession = serde_json::from_value(event.data.object)
                .map_err(|e| AppError::validation(format!("Malformed checkout session: {}", e)))?;
            if !signed {
                session = state.stripe.retrieve_checkout_session(&session.id).await?;
            }
            apply_paid_session(&state, &session).await?;
        }
        other => info!("Ignoring Stripe event type {}", other),
    }

    Ok(HttpResponse::Ok().json(json!({ "received": true })))
}

async fn apply_paid_session(state: &AppState, session: &CheckoutSession) -> AppResult<()> {
    if !session.is_paid() {
        info!("Checkout session {} completed without payment yet", session.id);
        return Ok(());
    }
    let Some(raw_id) = session.booking_id() else {
        warn!("Checkout session {} carries no booking_id", session.id);
        return Ok(());
    };
    let booking_id = match string_to_id(raw_id) {
        Ok(id) => id,
        Err(_) => {
            warn!("Checkout session {} has malformed booking_id {}", session.id, raw_id);
            return Ok(());
        }
    };

    let Some(booking) = state.db.find_booking(&booking_id).await? else {
        warn!("Checkout session {} names unknown booking {}", session.id, raw_id);
        return Ok(());
    };
    if !session.covers(booking.total_price) {
        warn!(
            "Checkout session {} charged {:?}, booking {} totals {:.2}; not marking paid",
            session.id,
            session.amount_total,
            raw_id,
            booking.total_price
        );
        return Ok(());
    }

    match state
        .db
        .mark_booking_paid(&booking_id, session.payment_intent.as_deref())
        .await
    {
        Ok(booking) => {
            info!("Booking {} paid via webhook ({})", booking_id.to_hex(), booking.status);
            Ok(())
        }
        Err(e @ AppError::Database(_)) => Err(e),
        Err(e) => {
            warn!("Webhook could not confirm booking {}: {}", booking_id.to_hex(), e);
            Ok(())
        }
    }
}
