//! HTTP boundary.
//!
//! Thin handlers: validate the request, build an [`ExecutionRequest`], hand
//! it to the executor and shape the answer as JSON or an SSE stream. Two
//! read-only listings help a client pick the project and its plan documents.
//!
//! [`ExecutionRequest`]: crate::executor::ExecutionRequest

mod api;
mod browse;
mod cors;
mod error;
mod routes;
mod state;
pub mod validate;

pub use api::{CommandRequest, CommandResponse, ContinueRequest, PlanRequest};
pub use browse::{FileInfo, FilesResponse, ProjectInfo, ProjectsResponse};
pub use cors::{cors_layer, origin_allowed};
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
