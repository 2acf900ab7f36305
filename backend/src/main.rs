mod config;
mod docx;
mod services;

use crate::config::Config;
use actix_web::http::StatusCode;
use actix_web::middleware::{ErrorHandlers, Logger};
use actix_web::{web, App, HttpServer};
use env_logger::Env;
use log::info;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let (host, port) = config.bind_address();
    let (host, port) = (host.to_string(), port);

    info!("Server listening on http://{}:{}", host, port);

    let config = web::Data::new(config);
    HttpServer::new(move || {
        App::new()
            .wrap(ErrorHandlers::new().handler(
                StatusCode::INTERNAL_SERVER_ERROR,
                services::internal_error,
            ))
            .wrap(Logger::default())
            .app_data(config.clone())
            .configure(services::configure)
    })
        .workers(1)
        .bind((host.as_str(), port))?
        .run()
        .await
}
