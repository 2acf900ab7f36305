//! # Generate Service Module
//!
//! Registers the single document generation endpoint.
//!
//! ## Sub-modules:
//! - `decode`: reads the multipart body into text fields and temporary files.
//! - `normalize`: turns empty and null payload values into a single space.
//! - `process`: the handler that renders the template and builds the response.
//! - `error`: failure modes and their JSON error bodies.

mod decode;
mod error;
mod normalize;
mod process;

use actix_web::http::header;
use actix_web::web::{post, resource, route, scope};
use actix_web::{HttpResponse, Scope};
use docgen_common::model::error_body::ErrorBody;

const API_PATH: &str = "/api";

/// Configures and returns the Actix `Scope` holding the generation route.
///
/// # Registered Routes:
///
/// *   **`POST /api/generate`**:
///     - **Handler**: `process::process`
///     - **Description**: Accepts `multipart/form-data` with a `template` file
///       (`.docx`, at most 5 MiB), an optional `data` JSON field and an
///       optional `outputFileName`. Responds with the rendered document as an
///       attachment, or a JSON error body with status `400`.
///
/// Any other method on `/api/generate` is answered with `405` and
/// `Allow: POST`. Unknown paths under `/api` fall through to the
/// application's default service.
pub fn configure_routes() -> Scope {
    scope(API_PATH).service(
        resource("/generate")
            .route(post().to(process::process))
            .default_service(route().to(method_not_allowed)),
    )
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed()
        .insert_header((header::ALLOW, "POST"))
        .json(ErrorBody::new("Method Not Allowed"))
}
