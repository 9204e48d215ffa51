//! Security hardening applied to every application.
//!
//! # Design Decisions
//! - Limits enforced before handlers see the request
//! - Header defaults never override what a handler set

pub mod headers;
pub mod limits;
