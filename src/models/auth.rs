use super::user::UserResponse;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 80, message = "Name must be 2-80 characters"))]
    pub name: String,
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 7, max = 20, message = "Phone number is invalid"))]
    pub phone: Option<String>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Email address is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 2, max = 80, message = "Name must be 2-80 characters"))]
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20, message = "Phone number is invalid"))]
    pub phone: Option<String>,
}

#[derive(Serialize, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}
