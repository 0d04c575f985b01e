//! Ghostrun Server Library
//!
//! Drives Claude Code subprocesses on behalf of HTTP callers:
//! - `subprocess`: one agent process invocation
//! - `executor`: streaming and synchronous execution
//! - `relay`: server-sent event transport for executor events
//! - `notify`: push notifications observing executor events
//! - `images`: staging of attached images for the prompt
//! - `server`: HTTP routes, request validation and shared state

pub mod executor;
pub mod images;
pub mod notify;
pub mod relay;
pub mod server;
pub mod subprocess;
