pub mod attendance;
pub mod audit;
pub mod auth;
pub mod booking;
pub mod dates;
pub mod gallery;
pub mod package;
pub mod payroll;
pub mod review;
pub mod staff;
pub mod user;

// Re-export all the models that are used in other modules
pub use attendance::{Attendance, AttendanceQuery, AttendanceResponse};
pub use audit::{AdminAudit, AuditQuery, AuditResponse, DashboardStats};
pub use auth::{
    AuthResponse, ChangePasswordRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
};
pub use booking::{
    AssignStaffRequest, Assignment, Booking, BookingQuery, BookingResponse, BookingStatus,
    CancelRequest, CheckoutResponse, ConfirmPaymentRequest, CreateBookingRequest, PaymentStatus,
    RespondRequest,
};
pub use gallery::{GalleryItem, GalleryQuery, GalleryResponse, UploadImageRequest};
pub use package::{
    CreatePackageRequest, Package, PackageQuery, PackageResponse, PriceQuote, PriceTier,
    QuoteQuery, UpdatePackageRequest,
};
pub use payroll::{
    GeneratePayrollRequest, PayFigures, Payroll, PayrollQuery, PayrollResponse, PayrollStatus,
};
pub use review::{CreateReviewRequest, PackageReviews, Review, ReviewResponse};
pub use staff::{
    AvailabilityQuery, CreateStaffRequest, Staff, StaffQuery, StaffResponse, UpdateStaffRequest,
};
pub use user::{Claims, Role, User, UserResponse};

use mongodb::bson;

/// RFC 3339 rendering of a stored timestamp.
pub fn format_datetime(dt: &bson::DateTime) -> String {
    dt.to_chrono().to_rfc3339()
}

/// Round a money or hours amount to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
