use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::io;
use std::time::Duration;

use crate::error::AppError;
use crate::handlers;
use crate::middleware::RequestTracking;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub bot_url: String,
    pub bot_timeout: Duration,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            bot_url: "http://localhost:5005".to_string(),
            bot_timeout: Duration::from_secs(30),
            workers: None,
        }
    }
}

pub fn app_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .route("/track", web::post().to(handlers::track::handler))
            .route("/message", web::post().to(handlers::message::handler))
            .route("/metrics", web::get().to(handlers::metrics::system))
            .route(
                "/analytics/conversations",
                web::get().to(handlers::analytics::conversations),
            )
            .route(
                "/analytics/conversations/{id}",
                web::get().to(handlers::analytics::conversation),
            )
            .route(
                "/analytics/errors",
                web::get().to(handlers::analytics::errors),
            )
            .route(
                "/analytics/intents",
                web::get().to(handlers::analytics::intents),
            )
            .route("/health", web::get().to(handlers::health::handler)),
    );
}

pub async fn run_server(config: ServerConfig) -> io::Result<()> {
    log::info!(
        "Initializing server on {}:{} with bot backend {}",
        config.host,
        config.port,
        config.bot_url
    );
    let state = AppState::from_config(&config)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    let state = web::Data::new(state);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(RequestTracking)
            .wrap(Cors::permissive())
            .configure(app_config)
    });
    if let Some(workers) = config.workers {
        server = server.workers(workers);
    }

    server
        .bind((config.host.as_str(), config.port))?
        .run()
        .await
}
