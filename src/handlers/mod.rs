pub mod admin;
pub mod attendance;
pub mod auth;
pub mod bookings;
pub mod gallery;
pub mod packages;
pub mod payments;
pub mod payroll;
pub mod reviews;
pub mod staff;

use actix_web::{error::JsonPayloadError, web, HttpRequest};

use crate::error::AppError;

/// Malformed or mistyped JSON bodies answer with the usual validation error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(8 * 1024 * 1024)
        .error_handler(|err: JsonPayloadError, _req: &HttpRequest| {
            AppError::validation(format!("Invalid request body: {}", err)).into()
        })
}

/// Query strings that fail to parse are validation errors too.
pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        AppError::validation(format!("Invalid query string: {}", err)).into()
    })
}

/// Register every `/api` route. Fixed path segments are declared before `{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(admin::health))
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/me", web::get().to(auth::me))
                    .route("/me", web::put().to(auth::update_me))
                    .route("/password", web::put().to(auth::change_password)),
            )
            .service(
                web::scope("/admin")
                    .route("/users", web::get().to(auth::list_users))
                    .route("/audit", web::get().to(admin::audit_log))
                    .route("/stats", web::get().to(admin::stats)),
            )
            .service(
                web::scope("/staff")
                    .route("", web::get().to(staff::list_staff))
                    .route("", web::post().to(staff::create_staff))
                    .route("/available", web::get().to(staff::available_staff))
                    .route("/{user_id}", web::put().to(staff::update_staff))
                    .route("/{user_id}", web::delete().to(staff::delete_staff)),
            )
            .service(
                web::scope("/packages")
                    .route("", web::get().to(packages::list_packages))
                    .route("", web::post().to(packages::create_package))
                    .route("/{id}", web::get().to(packages::get_package))
                    .route("/{id}", web::put().to(packages::update_package))
                    .route("/{id}", web::delete().to(packages::delete_package))
                    .route("/{id}/images", web::post().to(packages::upload_package_image))
                    .route("/{id}/quote", web::get().to(packages::quote))
                    .route("/{id}/reviews", web::get().to(reviews::package_reviews)),
            )
            .service(
                web::scope("/bookings")
                    .route("", web::get().to(bookings::list_bookings))
                    .route("", web::post().to(bookings::create_booking))
                    .route("/me", web::get().to(bookings::my_bookings))
                    .route("/assigned", web::get().to(bookings::assigned_bookings))
                    .route("/{id}", web::get().to(bookings::get_booking))
                    .route("/{id}/assign", web::put().to(bookings::assign_staff))
                    .route("/{id}/respond", web::put().to(bookings::respond_to_assignment))
                    .route("/{id}/complete", web::put().to(bookings::complete_booking))
                    .route("/{id}/cancel", web::put().to(bookings::cancel_booking)),
            )
            .service(
                web::scope("/payments")
                    .route("/checkout/{booking_id}", web::post().to(payments::create_checkout))
                    .route("/confirm", web::post().to(payments::confirm_payment))
                    .route("/webhook", web::post().to(payments::stripe_webhook)),
            )
            .service(
                web::scope("/gallery")
                    .route("", web::get().to(gallery::list_gallery))
                    .route("", web::post().to(gallery::upload_image))
                    .route("/pending", web::get().to(gallery::pending_gallery))
                    .route("/{id}/approve", web::put().to(gallery::approve_image))
                    .route("/{id}", web::delete().to(gallery::delete_image)),
            )
            .service(
                web::scope("/reviews")
                    .route("", web::get().to(reviews::latest_reviews))
                    .route("", web::post().to(reviews::create_review))
                    .route("/{id}", web::delete().to(reviews::delete_review)),
            )
            .service(
                web::scope("/attendance")
                    .route("", web::get().to(attendance::list_attendance))
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/me", web::get().to(attendance::my_attendance)),
            )
            .service(
                web::scope("/payroll")
                    .route("", web::get().to(payroll::list_payroll))
                    .route("/generate", web::post().to(payroll::generate_payroll))
                    .route("/me", web::get().to(payroll::my_payroll))
                    .route("/{id}/pay", web::put().to(payroll::mark_paid)),
            ),
    );
}
