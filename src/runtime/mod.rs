//! Application lifecycle
//!
//! - `app`: shared services and route registration
//! - `lifetime`: startup wiring and graceful shutdown
//! - `server`: HTTP server mode

pub mod app;
pub mod lifetime;
pub mod server;

pub use app::AppServices;
pub use server::run_server;
