use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use log::{error, info};

use safari_book::{config::Config, db::MongoDB, handlers, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info,actix_web=info"))
        .init();

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let db = MongoDB::new(&config.mongodb_uri, &config.database_name)
        .await
        .map_err(|e| {
            error!("Failed to create MongoDB client: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;

    if let Err(e) = db.ensure_indexes().await {
        error!("Failed to create indexes: {}", e);
        return Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()));
    }
    if let Err(e) = db.seed_data(config.force_seed).await {
        error!("Failed to seed packages: {}", e);
    }

    let bind = (config.host.clone(), config.port);
    let frontend_url = config.frontend_url.clone();
    let state = web::Data::new(AppState::new(db, config));

    info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(handlers::json_config())
            .app_data(handlers::query_config())
            .configure(handlers::configure)
    })
    .bind(bind)?
    .run()
    .await
}
