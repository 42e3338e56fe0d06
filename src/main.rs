#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

use actix_cors::Cors;
use actix_web::{
    middleware::{Compress, Logger},
    web, App, HttpServer,
};
use anyhow::Context;
use newsgate::{
    backend::{Backend, HttpBackend},
    configure_services,
    credentials::CredentialStore,
    identity::{IdentityProvider, PasswordIdentityProvider},
    payment::{PaymentProcessor, StripeProcessor},
    routes::RouteTable,
    settings::NewsgateSettings,
    utils::logging::LoggingHelper,
    AppState, SessionStore,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Loads .env and Settings.toml, applies env overrides and initializes the logger
    let settings = NewsgateSettings::load().context("Failed to load settings")?;

    let provider: Arc<dyn IdentityProvider> = Arc::new(
        PasswordIdentityProvider::new(&settings.identity)
            .context("Failed to initialize identity provider")?,
    );
    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&settings.backend).context("Failed to initialize backend client")?,
    );
    let processor: Arc<dyn PaymentProcessor> = Arc::new(
        StripeProcessor::new(&settings.payments)
            .context("Failed to initialize payment processor")?,
    );
    let credentials = CredentialStore::file(&settings.credentials.token_path);

    let store = SessionStore::start(provider, Arc::clone(&backend), credentials);
    let routes = RouteTable::from_settings(&settings.routes);

    LoggingHelper::log_startup(
        &settings.get_bind_address(),
        &settings.backend.base_url,
        routes.len(),
    );

    let state = AppState::new(store.clone(), backend, processor)
        .with_routes(routes)
        .with_post_upgrade_path(&settings.application.post_upgrade_path);

    start_server(state, &settings).await?;

    store.stop();
    Ok(())
}

/// Serve the dispatcher until shutdown
///
/// # Errors
///
/// Returns an error if binding the listen address fails or the server stops
/// with an I/O error
async fn start_server(state: AppState, settings: &NewsgateSettings) -> anyhow::Result<()> {
    let bind_address = settings.get_bind_address();
    let cors_origins = settings.get_cors_origins();

    HttpServer::new(move || {
        let cors_origins = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _| {
                cors_origins
                    .iter()
                    .any(|allowed| allowed == origin.to_str().unwrap_or(""))
            })
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type", "Accept"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(cors)
            .wrap(Compress::default())
            .wrap(Logger::default())
            .configure(configure_services)
    })
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {bind_address}"))?
    .run()
    .await
    .context("Server error")
}
