pub mod config;
pub mod error;
pub mod health;
pub mod proxy;
pub mod upload;
pub mod youtube;

use actix_web::web;

/// Registers every route on an `App`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health).service(upload::upload_video);
}
