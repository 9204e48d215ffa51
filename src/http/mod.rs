//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net)
//!     → server.rs (hyper-util auto: HTTP/1.1 or HTTP/2)
//!     → request.rs (request ID, request span)
//!     → security (limits, headers) and metrics middleware
//!     → application Router
//!     → Send to client
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
pub use server::{HttpServer, ServeError, ServerHandle, StopReport};
