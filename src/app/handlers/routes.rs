use super::doc::ApiDoc;
use super::{capture, classify, health, live_ws};
use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
    );
    cfg.route("/healthz", web::get().to(health::healthz));
    cfg.route("/traffic/classify", web::post().to(classify::classify_traffic));
    cfg.route("/ws/traffic", web::get().to(live_ws::live_traffic));
    cfg.route("/sniffer/start", web::post().to(capture::start_capture));
    cfg.route("/sniffer/stop", web::post().to(capture::stop_capture));
    cfg.route("/sniffer/restart", web::post().to(capture::restart_capture));
}
