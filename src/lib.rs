pub mod app;
pub mod classifier;
pub mod pipeline;
