use super::state::AppState;
use super::types::{CheckoutRequest, CheckoutResponse, SessionView};
use crate::upgrade::{catalog, find_plan, FlowError, UpgradeFlow, UpgradeOutcome};
use crate::utils::responses::ResponseBuilder;
use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde_json::json;

/// `GET /api/plans`
pub async fn list_plans() -> HttpResponse {
    ResponseBuilder::ok().json(&json!({ "plans": catalog() }))
}

fn flow_error_response(error: &FlowError) -> HttpResponse {
    match error {
        FlowError::SlotTaken | FlowError::Busy(_) => ResponseBuilder::conflict()
            .with_error_code("checkout_in_progress")
            .with_message("A checkout is already in progress.")
            .build(),
        FlowError::NotSignedIn => ResponseBuilder::unauthorized()
            .with_message("Please sign in to subscribe.")
            .build(),
        FlowError::FreePlan => ResponseBuilder::bad_request()
            .with_error_code("free_plan")
            .with_message("This plan is free and needs no payment.")
            .build(),
        FlowError::UnknownPlan(id) => ResponseBuilder::not_found()
            .with_error_code("unknown_plan")
            .with_message(&format!("No plan named '{id}'"))
            .build(),
        FlowError::InvalidTransition { .. } => ResponseBuilder::internal_server_error().build(),
    }
}

/// `POST /api/checkout`
///
/// Runs one upgrade flow to completion while holding the checkout slot.
/// Payment failures answer 402 with the inline message; a paid checkout whose
/// entitlement update failed answers 502 and is never retried here.
pub async fn checkout(
    request: web::Json<CheckoutRequest>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let request = request.into_inner();
    let Some(plan) = find_plan(&request.plan_id) else {
        return flow_error_response(&FlowError::UnknownPlan(request.plan_id));
    };

    let session = state.store.snapshot();
    if session.is_checking() {
        return ResponseBuilder::pending(1, &json!({ "status": "pending" }));
    }

    let _slot = match state.checkout.try_acquire() {
        Ok(guard) => guard,
        Err(e) => return flow_error_response(&e),
    };

    let bearer = match state.store.bearer().await {
        Ok(bearer) => bearer,
        Err(_) => return flow_error_response(&FlowError::NotSignedIn),
    };

    let mut flow = match UpgradeFlow::new(
        plan,
        &session,
        bearer,
        state.processor.clone(),
        state.backend.clone(),
    ) {
        Ok(flow) => flow.with_post_upgrade_path(&state.post_upgrade_path),
        Err(e) => return flow_error_response(&e),
    };
    info!("💳 Checkout {} started for plan {}", flow.id(), plan.id);

    let outcome = match flow.submit(&request.card).await {
        Ok(outcome) => outcome,
        Err(e) => return flow_error_response(&e),
    };

    match &outcome {
        UpgradeOutcome::PaymentFailed { message } => ResponseBuilder::payment_required()
            .with_message(message)
            .with_additional_fields(json!({
                "flow_id": flow.id().to_string(),
                "plan": flow.intent().target_plan_name,
                "state": flow.state(),
            }))
            .build(),
        UpgradeOutcome::EntitlementPending { message } => {
            warn!("Checkout {} paid without entitlement", flow.id());
            ResponseBuilder::bad_gateway()
                .with_error_code("entitlement_pending")
                .with_message(message)
                .with_additional_fields(json!({
                    "flow_id": flow.id().to_string(),
                    "plan": flow.intent().target_plan_name,
                    "state": flow.state(),
                }))
                .build()
        }
        UpgradeOutcome::Completed { .. } => {
            let session = state.store.refresh().await;
            ResponseBuilder::ok().json(&CheckoutResponse {
                flow_id: flow.id().to_string(),
                plan: flow.intent().target_plan_name.clone(),
                state: flow.state(),
                outcome: outcome.clone(),
                session: SessionView::from(&session),
            })
        }
    }
}
