//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle (stop begins)
//!     → state.rs (flip to draining)
//!     → application handlers read state for /healthz and /readyz
//!     → probe.rs (bootstrap-probe) turns the HTTP answer into an exit code
//! ```
//!
//! # Design Decisions
//! - Liveness only proves the process answers HTTP
//! - Readiness drops as soon as draining starts so orchestrators stop routing

pub mod probe;
pub mod state;

pub use state::HealthState;
