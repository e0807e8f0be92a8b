//! Applies an engine `Decision` to an in-flight hyper request/response pair.

use crate::engine::Decision;
use crate::rule::RedirectStatus;
use hyper::header::{HeaderValue, LOCATION};
use hyper::{Request, Response, StatusCode, Uri};

/// What happened to the request after applying a decision.
#[derive(Debug)]
pub enum Applied {
    /// The request's effective URI was updated in place; hand it to the next
    /// stage of request handling.
    Forwarded,
    /// A terminal response was produced; no downstream handler runs.
    Responded(Response<String>),
    /// Terminate the connection without a response.
    Aborted,
}

/// Apply a decision, mutating the request for rewrites and building the
/// response for terminal outcomes.
pub fn apply<B>(decision: &Decision, req: &mut Request<B>) -> Applied {
    match decision {
        Decision::Continue(path_and_query) => {
            if let Some(uri) = rebuild_uri(req.uri(), path_and_query) {
                *req.uri_mut() = uri;
            }
            Applied::Forwarded
        }
        Decision::Redirect { location, status } => {
            Applied::Responded(redirect_response(location, *status))
        }
        Decision::Abort => Applied::Aborted,
        Decision::CustomResponse {
            status,
            description,
            ..
        } => {
            let status =
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut response = Response::new(description.clone().unwrap_or_default());
            *response.status_mut() = status;
            Applied::Responded(response)
        }
    }
}

/// Build the redirect response for a resolved location.
pub fn redirect_response(location: &str, status: RedirectStatus) -> Response<String> {
    let status = match status {
        RedirectStatus::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
        RedirectStatus::Found => StatusCode::FOUND,
        RedirectStatus::TemporaryRedirect => StatusCode::TEMPORARY_REDIRECT,
        RedirectStatus::PermanentRedirect => StatusCode::PERMANENT_REDIRECT,
    };

    let mut response = Response::new(String::new());
    *response.status_mut() = status;
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

/// Rebuild a URI with a new path-and-query, keeping scheme and authority.
fn rebuild_uri(uri: &Uri, path_and_query: &str) -> Option<Uri> {
    let mut builder = Uri::builder();
    if let Some(scheme) = uri.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = uri.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.path_and_query(path_and_query).build().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continue_rewrites_request_uri() {
        let mut req = Request::builder()
            .uri("http://example.com/old/path?drop=me")
            .body(())
            .unwrap();

        let decision = Decision::Continue("/new/path?keep=1".to_string());
        let applied = apply(&decision, &mut req);

        assert!(matches!(applied, Applied::Forwarded));
        assert_eq!(req.uri().path(), "/new/path");
        assert_eq!(req.uri().query(), Some("keep=1"));
        assert_eq!(req.uri().host(), Some("example.com"));
    }

    #[test]
    fn test_redirect_builds_location_response() {
        let mut req = Request::builder().uri("/redirect-rule/foo").body(()).unwrap();

        let decision = Decision::Redirect {
            location: "/redirected/foo".to_string(),
            status: RedirectStatus::Found,
        };
        let Applied::Responded(response) = apply(&decision, &mut req) else {
            panic!("expected a response");
        };

        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            "/redirected/foo"
        );
        // Redirects short-circuit; the request URI is untouched.
        assert_eq!(req.uri().path(), "/redirect-rule/foo");
    }

    #[test]
    fn test_permanent_redirect_status() {
        let response = redirect_response("/x", RedirectStatus::MovedPermanently);
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    }

    #[test]
    fn test_abort() {
        let mut req = Request::builder().uri("/anything").body(()).unwrap();
        assert!(matches!(apply(&Decision::Abort, &mut req), Applied::Aborted));
    }

    #[test]
    fn test_custom_response_carries_status_and_body() {
        let mut req = Request::builder().uri("/secret").body(()).unwrap();
        let decision = Decision::CustomResponse {
            status: 403,
            reason: Some("Forbidden".to_string()),
            description: Some("No.".to_string()),
        };

        let Applied::Responded(response) = apply(&decision, &mut req) else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.body(), "No.");
    }
}
