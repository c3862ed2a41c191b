use actix_web::{http, HttpResponse, Responder};
use utoipa;

/// Health check endpoint
///
/// Checks whether the server is capable of responding to a request
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Api is healthy", body = String),
    ),
)]
pub async fn healthz() -> impl Responder {
    HttpResponse::build(http::StatusCode::OK).body("OK".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App};

    #[actix_rt::test]
    async fn healthz_responds_ok() {
        let app =
            test::init_service(App::new().route("/healthz", web::get().to(healthz))).await;

        let req = test::TestRequest::get().uri("/healthz").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }
}
