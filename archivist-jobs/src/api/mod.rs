//! HTTP API handlers for archivist-jobs
//!
//! JSON REST for job submission and status, SSE for live job events.

pub mod health;
pub mod jobs;
pub mod settings;
pub mod sse;
pub mod terms;
pub mod user;

pub use health::health_routes;
pub use jobs::job_routes;
pub use settings::settings_routes;
pub use sse::job_event_stream;
pub use terms::term_routes;
pub use user::RequestUser;
