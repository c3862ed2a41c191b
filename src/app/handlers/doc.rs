use super::{capture, classify, health};
use crate::app::models::{ClassificationEvent, ControlResponse, Features, Labeled};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        classify::classify_traffic,
        capture::start_capture,
        capture::stop_capture,
        capture::restart_capture,
        health::healthz,
    ),
    components(
        schemas(Features, Labeled, ControlResponse, ClassificationEvent),
    ),
    tags(
        (name = "sentinel", description = "Traffic classification api endpoints")
    ),
)]
pub struct ApiDoc;
