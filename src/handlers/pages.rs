use super::state::AppState;
use super::types::{PageView, ReturnQuery, SessionView};
use crate::guards::{evaluate, guest_gate, GuardDecision};
use crate::models::HealthResponse;
use crate::routes::NOT_FOUND_PAGE;
use crate::utils::logging::LoggingHelper;
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

/// Seconds a client should wait before asking again while the auth check runs
const PENDING_RETRY_SECONDS: u32 = 1;

/// Health check endpoint
pub async fn health() -> HttpResponse {
    ResponseBuilder::ok().json(&HealthResponse {
        status: "ok".to_string(),
        message: "newsgate is running".to_string(),
    })
}

/// Resolve a client navigation
///
/// Evaluates the route guards against the current session snapshot and acts
/// on the decision: render a page descriptor, redirect, or tell the client
/// the auth check is still in flight.
pub async fn serve_page(
    req: HttpRequest,
    query: web::Query<ReturnQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let path = req.path();
    let Some(matched) = state.routes.resolve(path) else {
        return ResponseBuilder::not_found().build();
    };
    let route = matched.route;
    let session = state.store.snapshot();

    let decision = if route.guest_only {
        guest_gate(&session, query.from.as_deref())
    } else {
        evaluate(&session, &route.requirement, path)
    };
    LoggingHelper::log_guard_decision(path, &decision);

    match decision {
        GuardDecision::Pending => ResponseBuilder::pending(
            PENDING_RETRY_SECONDS,
            &json!({ "status": "pending", "page": route.page }),
        ),
        GuardDecision::Redirect { to, .. } => ResponseBuilder::redirect(&to).build(),
        GuardDecision::Render => {
            if let Some(target) = route.redirect_to.as_deref() {
                return ResponseBuilder::redirect(target).build();
            }

            let view = PageView {
                page: route.page.clone(),
                path: path.to_string(),
                params: matched.params,
                session: SessionView::from(&session),
            };
            if route.page == NOT_FOUND_PAGE {
                HttpResponse::NotFound().json(view)
            } else {
                ResponseBuilder::ok().json(&view)
            }
        }
    }
}
