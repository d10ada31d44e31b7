use actix_web::{http::StatusCode, test, web, App};
use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};

use safari_book::{
    auth::issue_token,
    config::Config,
    db::MongoDB,
    handlers,
    models::Role,
    state::AppState,
};

const SECRET: &str = "integration-secret";

// Nothing listens on port 1, so any query that reaches Mongo fails fast.
const UNREACHABLE_MONGO: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200&connectTimeoutMS=200";

async fn test_state(webhook_secret: Option<&str>) -> web::Data<AppState> {
    let webhook_secret = webhook_secret.map(str::to_string);
    let config = Config::from_lookup(move |key| match key {
        "JWT_SECRET" => Some(SECRET.to_string()),
        "STRIPE_SECRET_KEY" => Some("sk_test_123".to_string()),
        "IMGBB_API_KEY" => Some("imgbb-key".to_string()),
        "STRIPE_WEBHOOK_SECRET" => webhook_secret.clone(),
        _ => None,
    })
    .unwrap();
    let db = MongoDB::new(UNREACHABLE_MONGO, "safari_test").await.unwrap();
    web::Data::new(AppState::new(db, config))
}

fn bearer(role: Role) -> (&'static str, String) {
    let token = issue_token(&ObjectId::new(), role, SECRET, 1).unwrap();
    ("Authorization", format!("Bearer {}", token))
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data($state)
                .app_data(handlers::json_config())
                .app_data(handlers::query_config())
                .configure(handlers::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn health_answers_without_database() {
    let app = app!(test_state(None).await);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "down");
}

#[actix_web::test]
async fn missing_token_is_unauthorized() {
    let app = app!(test_state(None).await);
    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/bookings/me").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "UNAUTHORIZED");
    assert_eq!(body["code"], 401);
}

#[actix_web::test]
async fn forged_token_is_unauthorized() {
    let app = app!(test_state(None).await);
    let forged = issue_token(&ObjectId::new(), Role::Admin, "some-other-secret", 1).unwrap();
    let req = test::TestRequest::get()
        .uri("/api/admin/stats")
        .insert_header(("Authorization", format!("Bearer {}", forged)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn customers_cannot_reach_admin_routes() {
    let app = app!(test_state(None).await);
    for uri in ["/api/admin/stats", "/api/admin/audit", "/api/admin/users", "/api/staff", "/api/payroll"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(bearer(Role::Customer))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN, "{}", uri);
    }
}

#[actix_web::test]
async fn customers_cannot_see_staff_assignments() {
    let app = app!(test_state(None).await);
    let req = test::TestRequest::get()
        .uri("/api/bookings/assigned")
        .insert_header(bearer(Role::Customer))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn staff_tokens_are_checked_against_the_account_store() {
    let app = app!(test_state(None).await);
    let req = test::TestRequest::get()
        .uri("/api/admin/stats")
        .insert_header(bearer(Role::Admin))
        .to_request();
    let resp = test::call_service(&app, req).await;
    // The lookup cannot reach Mongo here, so a signed admin token alone is not enough.
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[actix_web::test]
async fn customers_cannot_check_in() {
    let app = app!(test_state(None).await);
    let req = test::TestRequest::post()
        .uri("/api/attendance/check-in")
        .insert_header(bearer(Role::Customer))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn malformed_json_is_a_validation_error() {
    let app = app!(test_state(None).await);
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"name\": 42")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn registration_fields_are_validated() {
    let app = app!(test_state(None).await);
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "name": "Ruwan", "email": "not-an-email", "password": "short" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("Email address is invalid"), "{}", message);
    assert!(message.contains("Password must be at least 8 characters"), "{}", message);
}

#[actix_web::test]
async fn malformed_ids_are_rejected() {
    let app = app!(test_state(None).await);
    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/packages/not-an-id/quote?adults=2")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::put()
        .uri("/api/bookings/not-an-id/cancel")
        .insert_header(bearer(Role::Customer))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn oversized_quote_is_rejected() {
    let app = app!(test_state(None).await);
    let uri = format!(
        "/api/packages/{}/quote?adults=2147483647&children=2147483647",
        ObjectId::new().to_hex()
    );
    let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[actix_web::test]
async fn unsigned_webhook_is_rejected_when_secret_configured() {
    let app = app!(test_state(Some("whsec_test")).await);
    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .set_payload(r#"{"id":"evt_1","type":"checkout.session.completed","data":{"object":{}}}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::post()
        .uri("/api/payments/webhook")
        .insert_header(("Stripe-Signature", "t=1,v1=deadbeef"))
        .set_payload("{}")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
