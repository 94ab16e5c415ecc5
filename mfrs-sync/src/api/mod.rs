//! HTTP API handlers for mfrs-sync

pub mod health;
pub mod pies;
pub mod refresh;

pub use health::health_routes;
pub use pies::get_pie;
pub use refresh::trigger_refresh;
