//! Request routing dispatch module
//!
//! Entry point for HTTP request processing. The router is constructed
//! explicitly at startup from the loaded configuration and passed into the
//! server start call; it owns every routing decision the server makes, which
//! for this server is the HTTP method gate plus a catch-all static route.

use crate::config::Config;
use crate::handler::static_files;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::header::{HeaderValue, SERVER};
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

/// Routing table, built once in `main` and shared by every connection
///
/// All paths (`/` and everything under it) dispatch to the static file
/// handler rooted at `root_dir`.
pub struct Router {
    root_dir: String,
    index_files: Vec<String>,
    enable_cors: bool,
    access_log: bool,
    access_log_format: String,
    server_name: String,
}

impl Router {
    /// Build the router from loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_dir: config.resources.root_dir.clone(),
            index_files: config.resources.index_files.clone(),
            enable_cors: config.http.enable_cors,
            access_log: config.logging.access_log,
            access_log_format: config.logging.access_log_format.clone(),
            server_name: config.http.server_name.clone(),
        }
    }

    /// Main entry point for HTTP request handling
    pub async fn handle_request<B>(
        &self,
        req: Request<B>,
        peer_addr: SocketAddr,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let started = Instant::now();

        let mut response = self.dispatch(&req).await;

        if let Ok(name) = HeaderValue::from_str(&self.server_name) {
            response.headers_mut().insert(SERVER, name);
        }

        if self.access_log {
            let entry = access_entry(&req, &response, peer_addr, started);
            logger::log_access(&entry, &self.access_log_format);
        }

        Ok(response)
    }

    /// Route the request: method gate, then the static catch-all
    async fn dispatch<B>(&self, req: &Request<B>) -> Response<Full<Bytes>> {
        let method = req.method();

        if let Some(resp) = check_http_method(method, self.enable_cors) {
            return resp;
        }

        let ctx = RequestContext {
            path: req.uri().path(),
            is_head: *method == Method::HEAD,
            if_none_match: header_string(req, "if-none-match"),
            range_header: header_string(req, "range"),
        };

        static_files::serve(&ctx, &self.root_dir, &self.index_files).await
    }
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match method {
        &Method::GET | &Method::HEAD => None,
        &Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Extract a header value as an owned string, skipping non-UTF-8 values
fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Build the access log entry for a finished request
fn access_entry<B>(
    req: &Request<B>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer = header_string(req, "referer");
    entry.user_agent = header_string(req, "user-agent");
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

fn version_label(version: Version) -> &'static str {
    if version == Version::HTTP_10 {
        "1.0"
    } else if version == Version::HTTP_2 {
        "2"
    } else if version == Version::HTTP_3 {
        "3"
    } else {
        "1.1"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use http_body_util::BodyExt;

    fn test_router(root_dir: &str) -> Router {
        let mut cfg = Config::load_from("no-such-config-file").unwrap();
        cfg.resources.root_dir = root_dir.to_string();
        cfg.logging.access_log = false;
        Router::from_config(&cfg)
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<()> {
        Request::builder().method(method).uri(uri).body(()).unwrap()
    }

    #[tokio::test]
    async fn post_is_method_not_allowed() {
        let router = test_router("dist");
        let resp = router
            .handle_request(request(Method::POST, "/index.html"), peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), 405);
        assert_eq!(resp.headers()["Allow"], "GET, HEAD, OPTIONS");
    }

    #[tokio::test]
    async fn options_is_no_content() {
        let router = test_router("dist");
        let resp = router
            .handle_request(request(Method::OPTIONS, "/"), peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), 204);
    }

    #[tokio::test]
    async fn responses_carry_server_header() {
        let router = test_router("dist");
        let resp = router
            .handle_request(request(Method::OPTIONS, "/"), peer())
            .await
            .unwrap();
        assert_eq!(resp.headers()["Server"], "distserv/0.1");
    }

    #[tokio::test]
    async fn missing_root_is_not_found() {
        let router = test_router("no-such-root-dir");
        let resp = router
            .handle_request(request(Method::GET, "/index.html"), peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn traversal_probe_is_not_found() {
        let router = test_router("dist");
        let resp = router
            .handle_request(request(Method::GET, "/../secret.txt"), peer())
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"404 Not Found");
    }
}
