pub mod config;
pub mod errors;
mod handlers;
pub mod hub;
pub mod models;
pub mod state;

pub use handlers::routes;
