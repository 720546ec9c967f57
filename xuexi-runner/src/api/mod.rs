//! HTTP API handlers for xuexi-runner
//!
//! JSON control endpoints plus an SSE progress stream.

pub mod device;
pub mod health;
pub mod session;
pub mod settings;
pub mod sse;

pub use device::device_routes;
pub use health::health_routes;
pub use session::session_routes;
pub use settings::settings_routes;
pub use sse::event_stream;
