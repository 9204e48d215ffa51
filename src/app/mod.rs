//! Application seam.
//!
//! # Data Flow
//! ```text
//! "main:app" (config / --app)
//!     → target.rs (parse import string)
//!     → registry.rs (resolve to an Application)
//!     → Application::router(ctx) → axum Router
//!     → http::server wraps it in middleware and serves it
//! ```

pub mod builtin;
pub mod registry;
pub mod target;

use axum::Router;

use crate::health::HealthState;

pub use builtin::LivenessApp;
pub use registry::{AppRegistry, AppResolveError};
pub use target::{AppRef, AppRefError};

/// What an application gets to see of the server hosting it.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub health: HealthState,
    pub title: String,
}

impl AppContext {
    pub fn new(health: HealthState, title: impl Into<String>) -> Self {
        Self {
            health,
            title: title.into(),
        }
    }
}

/// An application object the bootstrap can serve.
pub trait Application: Send + Sync + 'static {
    /// Build the request router for this application.
    fn router(&self, ctx: &AppContext) -> Router;
}

impl<F> Application for F
where
    F: Fn(&AppContext) -> Router + Send + Sync + 'static,
{
    fn router(&self, ctx: &AppContext) -> Router {
        self(ctx)
    }
}
