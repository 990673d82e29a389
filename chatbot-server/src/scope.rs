pub mod datasets;
pub mod models;
pub mod sessions;
