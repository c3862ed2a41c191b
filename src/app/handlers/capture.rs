use actix_web::{http, web, HttpResponse, Responder};

use crate::app::models::ControlResponse;
use crate::app::state::State;

/// Start the capture pipeline
///
/// Idempotent intent: starting a pipeline that is already live yields
/// `already_running`, never an error.
#[utoipa::path(
    post,
    path = "/sniffer/start",
    responses(
        (status = 200, description = "Structured start outcome", body = ControlResponse),
    ),
)]
pub async fn start_capture(state: web::Data<State>) -> impl Responder {
    let outcome = state.supervisor.start().await;
    HttpResponse::build(http::StatusCode::OK).json(ControlResponse::from(outcome))
}

/// Stop the capture pipeline
///
/// Cooperative stop; `not_running` reports there was nothing to stop.
#[utoipa::path(
    post,
    path = "/sniffer/stop",
    responses(
        (status = 200, description = "Structured stop outcome", body = ControlResponse),
    ),
)]
pub async fn stop_capture(state: web::Data<State>) -> impl Responder {
    let outcome = state.supervisor.stop().await;
    HttpResponse::build(http::StatusCode::OK).json(ControlResponse::from(outcome))
}

/// Restart the capture pipeline
///
/// Stop followed by start after a settle delay; reports the start's
/// outcome, or the stop failure when that half went wrong.
#[utoipa::path(
    post,
    path = "/sniffer/restart",
    responses(
        (status = 200, description = "Structured restart outcome", body = ControlResponse),
    ),
)]
pub async fn restart_capture(state: web::Data<State>) -> impl Responder {
    let outcome = state.supervisor.restart().await;
    HttpResponse::build(http::StatusCode::OK).json(ControlResponse::from(outcome))
}
