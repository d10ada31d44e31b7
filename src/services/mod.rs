pub mod imgbb;
pub mod stripe;

pub use imgbb::{decode_image_payload, ImgbbClient, UploadedImage};
pub use stripe::{CheckoutItem, CheckoutSession, StripeClient, WebhookEvent};
