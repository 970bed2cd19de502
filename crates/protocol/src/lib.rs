//! Wire types for the browser debugging protocol.
//!
//! This crate is serde-only: it knows the generic envelope shapes carried over a
//! target's control socket and the descriptors returned by the HTTP discovery
//! surface. It performs no I/O.

pub mod envelope;
pub mod target;

pub use envelope::{ErrorPayload, Event, Message, Request, Response, TARGET_CRASHED, normalize_params};
pub use target::{TargetInfo, VersionInfo};
