//! HTTP surface of the service.
//!
//! Only `POST /api/generate` is served; every other path answers `404` with a
//! JSON body, and responses the framework fails with `500` are rewritten to a
//! JSON body without details.

pub mod generate;

use actix_web::body::BoxBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::web::{self, route};
use actix_web::HttpResponse;
use docgen_common::model::error_body::ErrorBody;

/// Registers every route plus the JSON `404` fallback.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(generate::configure_routes())
        .default_service(route().to(not_found));
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().json(ErrorBody::new("Not Found"))
}

/// Replaces the body of a framework-level `500` with a generic JSON error.
pub fn internal_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    log::error!(
        "internal error on {} {}",
        res.request().method(),
        res.request().path()
    );
    let (req, res) = res.into_parts();
    let mut replacement: HttpResponse<BoxBody> =
        HttpResponse::build(res.status()).json(ErrorBody::new("Internal Server Error"));
    replacement.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json; charset=utf-8"),
    );
    let res = ServiceResponse::new(req, replacement).map_into_right_body::<B>();
    Ok(ErrorHandlerResponse::Response(res))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::middleware::ErrorHandlers;
    use actix_web::test::{self, TestRequest};
    use actix_web::App;

    async fn explode() -> HttpResponse {
        HttpResponse::InternalServerError().body("stack trace with secrets")
    }

    #[actix_web::test]
    async fn framework_errors_become_generic_json() {
        let app = test::init_service(
            App::new()
                .wrap(ErrorHandlers::new().handler(StatusCode::INTERNAL_SERVER_ERROR, internal_error))
                .route("/boom", web::get().to(explode)),
        )
        .await;
        let resp = test::call_service(&app, TestRequest::get().uri("/boom").to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = test::read_body_json(resp).await;
        assert_eq!(body, ErrorBody::new("Internal Server Error"));
    }
}
