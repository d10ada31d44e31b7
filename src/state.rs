use crate::{
    config::Config,
    db::MongoDB,
    services::{ImgbbClient, StripeClient},
};

/// Shared handles every handler receives through `web::Data<AppState>`.
#[derive(Clone)]
pub struct AppState {
    pub db: MongoDB,
    pub config: Config,
    pub stripe: StripeClient,
    pub imgbb: ImgbbClient,
}

impl AppState {
    pub fn new(db: MongoDB, config: Config) -> Self {
        Self {
            stripe: StripeClient::new(&config.stripe),
            imgbb: ImgbbClient::new(&config.imgbb),
            db,
            config,
        }
    }
}
