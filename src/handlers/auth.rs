use super::state::AppState;
use super::types::{AuthResponse, LogoutResponse, ReturnQuery, SessionView};
use crate::guards::{safe_return_path, DEFAULT_RETURN_PATH};
use crate::models::auth::{AuthenticationError, PasswordCredentials};
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpResponse};
use log::warn;

fn authentication_error_response(error: &AuthenticationError, message: &str) -> HttpResponse {
    match error {
        AuthenticationError::Rejected(_) => ResponseBuilder::authentication_failed(message),
        AuthenticationError::Credentials(_) => ResponseBuilder::internal_server_error()
            .with_message(message)
            .build(),
        _ => ResponseBuilder::service_unavailable()
            .with_error_code("authentication_unavailable")
            .with_message(message)
            .build(),
    }
}

/// `POST /auth/login`
///
/// The session has been refreshed by the time this answers, so the returned
/// redirect target is evaluated against the new role.
pub async fn login(
    credentials: web::Json<PasswordCredentials>,
    query: web::Query<ReturnQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    match state.store.sign_in(&credentials).await {
        Ok(outcome) => ResponseBuilder::ok().json(&AuthResponse {
            redirect_to: safe_return_path(query.from.as_deref()),
            session: SessionView::from(&outcome.session),
            notices: outcome.notices,
        }),
        Err(e) => {
            warn!("Sign-in failed: {e}");
            authentication_error_response(&e, e.user_message())
        }
    }
}

/// `POST /auth/register`
pub async fn register(
    credentials: web::Json<PasswordCredentials>,
    query: web::Query<ReturnQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    match state.store.register(&credentials).await {
        Ok(outcome) => ResponseBuilder::ok().json(&AuthResponse {
            redirect_to: safe_return_path(query.from.as_deref()),
            session: SessionView::from(&outcome.session),
            notices: outcome.notices,
        }),
        Err(AuthenticationError::Rejected(code)) => {
            warn!("Registration rejected: {code}");
            ResponseBuilder::registration_failed(
                AuthenticationError::Rejected(code).registration_message(),
            )
        }
        Err(e) => {
            warn!("Registration failed: {e}");
            authentication_error_response(&e, e.registration_message())
        }
    }
}

/// `POST /auth/logout`
///
/// Answers only after the anonymous session has been published.
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    match state.store.sign_out().await {
        Ok(notice) => ResponseBuilder::ok().json(&LogoutResponse {
            redirect_to: DEFAULT_RETURN_PATH.to_string(),
            notice,
        }),
        Err(e) => {
            warn!("Sign-out failed: {e}");
            ResponseBuilder::bad_gateway()
                .with_error_code("logout_failed")
                .with_message("Failed to log out.")
                .build()
        }
    }
}

/// `GET /api/session`
pub async fn current_session(state: web::Data<AppState>) -> HttpResponse {
    ResponseBuilder::ok().json(&SessionView::from(&state.store.snapshot()))
}
