use actix_web::{http, web, HttpResponse};
use chrono::Utc;
use log::info;

use crate::app::errors::{AppError, ResponderErr};
use crate::app::hub::Publish;
use crate::app::models::{ClassificationEvent, Features, Labeled};
use crate::app::state::State;

/// Classify an externally supplied feature vector
///
/// One-shot path sharing the classifier and the broadcast hub with the
/// capture pipeline: classify, fan the labeled event out to the live
/// subscribers, return the label.
#[utoipa::path(
    post,
    path = "/traffic/classify",
    request_body = Features,
    responses(
        (status = 200, description = "Feature vector classified", body = Labeled),
        (status = 500, description = "Classification failed"),
    ),
)]
pub async fn classify_traffic(
    state: web::Data<State>,
    body: web::Json<Features>,
) -> Result<HttpResponse, ResponderErr> {
    let features = body.into_inner();
    info!("received features: {:?}", features);

    let label = state
        .classifier
        .classify(&features.vector())
        .map_err(AppError::from)?
        .to_owned();

    state.hub.do_send(Publish(ClassificationEvent {
        fwd: features.total_fwd_packets,
        bwd: features.total_backward_packets,
        label: label.clone(),
        src_ip: None,
        dst_ip: None,
        timestamp: Utc::now().timestamp_millis() as u64,
    }));

    Ok(HttpResponse::build(http::StatusCode::OK).json(Labeled { label }))
}
