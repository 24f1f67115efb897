//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::listener)
//!     → TraceLayer
//!     → request.rs (add / propagate request ID)
//!     → gate.rs (closed? → response.rs 503)
//!     → axum Router (routes registered through Server::handle)
//!     → Send to client
//! ```

pub mod gate;
pub mod request;
pub mod response;
pub mod server;

pub use gate::Gate;
pub use request::{UuidRequestId, X_REQUEST_ID};
pub use response::REJECTION_BODY;
pub use server::Server;
