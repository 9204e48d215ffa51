//! Service bootstrap library.
//!
//! Binds an HTTP listener on a configured host/port and serves an
//! application object resolved from a `<module>:<attribute>` import string.

pub mod app;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod security;

pub use app::{AppContext, AppRegistry, Application};
pub use config::schema::ServiceConfig;
pub use http::{HttpServer, ServerHandle, StopReport};
pub use lifecycle::Shutdown;
pub use net::ListenerError;
