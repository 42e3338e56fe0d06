// HTTP request handlers: the only place navigation decisions are acted on
pub mod auth;
pub mod pages;
pub mod state;
pub mod subscription;
pub mod types;


pub use auth::{current_session, login, logout, register};
pub use pages::{health, serve_page};
pub use state::AppState;
pub use subscription::{checkout, list_plans};

use actix_web::web;

/// Register every endpoint; the page dispatcher catches all remaining paths
pub fn configure_services(cfg: &mut web::ServiceConfig) {
    cfg.route("/ping", web::get().to(health))
        // Session endpoints
        .route("/auth/login", web::post().to(login))
        .route("/auth/register", web::post().to(register))
        .route("/auth/logout", web::post().to(logout))
        .route("/api/session", web::get().to(current_session))
        // Upgrade flow
        .route("/api/plans", web::get().to(list_plans))
        .route("/api/checkout", web::post().to(checkout))
        // Client navigation
        .default_service(web::to(serve_page));
}
