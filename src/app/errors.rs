use actix_web::http::{header::ContentType, StatusCode};
use actix_web::HttpResponse;
use derive_more::{Display, Error};
use log::error;

use crate::classifier::ModelError;

#[derive(Debug)]
pub enum ConfigErr {
    Read(config::ConfigError),
}

/// Startup failures; both are fatal before the server binds.
#[derive(Debug)]
pub enum InitErr {
    Config(ConfigErr),
    Model(ModelError),
}

#[derive(Debug)]
pub enum AppError {
    Classification(ModelError),
}

impl From<ModelError> for AppError {
    fn from(e: ModelError) -> Self {
        error!(target: "classification_errors", "{e:?}");
        Self::Classification(e)
    }
}

impl From<AppError> for ResponderErr {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Classification(_) => Self::InternalError,
        }
    }
}

/// User-visible failure: always the same opaque body, internals stay in
/// the logs.
#[derive(Debug, Display, Error)]
pub enum ResponderErr {
    #[display(fmt = "An internal error occurred. Please try again later.")]
    InternalError,
}

impl actix_web::error::ResponseError for ResponderErr {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(self.to_string())
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
