pub mod capture;
pub mod classify;
pub mod doc;
pub mod health;
pub mod live_ws;
mod routes;

pub use routes::routes;
