mod attendance;
mod audit;
mod bookings;
mod gallery;
pub mod mongodb;
mod packages;
mod payroll;
mod reviews;
mod staff;
mod users;

pub use self::mongodb::{string_to_id, MongoDB};
pub use self::users::normalize_email;
