pub mod config;
pub mod handler;
pub mod session_store;
pub mod startup;
pub mod telemetry;
pub(crate) mod utils;

mod scope;

pub use startup::run;
