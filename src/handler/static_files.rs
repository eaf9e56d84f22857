//! Static file serving module
//!
//! The file-serving primitive behind the catch-all route: path resolution
//! with traversal containment, index-file fallback for directories, MIME
//! detection, and conditional/range response building.

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, range::RangeParseResult};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Successful load: file bytes plus detected content type
#[derive(Debug)]
pub struct Loaded {
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

/// Failure taxonomy of the file-serving primitive
#[derive(Debug)]
pub enum ServeError {
    /// Missing file, directory without an index file, or a path rejected by
    /// traversal containment
    NotFound,
    /// The path resolves but the file cannot be read by this process
    Forbidden,
    /// Any other filesystem failure
    Io(io::Error),
}

impl ServeError {
    fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::PermissionDenied => Self::Forbidden,
            _ => Self::Io(err),
        }
    }
}

/// Serve the request path from the static root directory
pub async fn serve(
    ctx: &RequestContext<'_>,
    root_dir: &str,
    index_files: &[String],
) -> Response<Full<Bytes>> {
    match load_from_root(root_dir, ctx.path, index_files).await {
        Ok(loaded) => build_static_file_response(
            &loaded.content,
            loaded.content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head,
            ctx.range_header.as_deref(),
        ),
        Err(ServeError::NotFound) => http::build_404_response(),
        Err(ServeError::Forbidden) => http::build_403_response(),
        Err(ServeError::Io(e)) => {
            logger::log_error(&format!("Failed to serve '{}': {e}", ctx.path));
            http::build_500_response()
        }
    }
}

/// Load the file beneath `root_dir` named by the request path
///
/// The leading slash is stripped and the remainder joined onto the root.
/// Containment is enforced twice: lexically (no `..` or absolute components
/// reach the filesystem at all) and physically (the canonicalized result must
/// stay under the canonicalized root, which also covers symlinks pointing
/// out of the tree).
pub async fn load_from_root(
    root_dir: &str,
    path: &str,
    index_files: &[String],
) -> Result<Loaded, ServeError> {
    let Some(relative) = sanitize_path(path.trim_start_matches('/')) else {
        logger::log_warning(&format!("Path traversal attempt blocked: {path}"));
        return Err(ServeError::NotFound);
    };

    let root = Path::new(root_dir);
    let mut file_path = root.join(&relative);

    // Directory requests (including "/" itself) fall back to index files
    if file_path.is_dir() {
        file_path = first_index_file(&file_path, index_files).ok_or(ServeError::NotFound)?;
    }

    let root_canonical = root.canonicalize().map_err(|e| {
        logger::log_warning(&format!(
            "Static root directory not found or inaccessible '{root_dir}': {e}"
        ));
        ServeError::from_io(e)
    })?;

    // Missing files land here; that is an ordinary 404, not worth logging
    let file_canonical = file_path.canonicalize().map_err(ServeError::from_io)?;
    if !file_canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path escapes static root: {} -> {}",
            path,
            file_canonical.display()
        ));
        return Err(ServeError::NotFound);
    }

    let content = fs::read(&file_canonical)
        .await
        .map_err(ServeError::from_io)?;
    let content_type =
        mime::content_type_for(file_canonical.extension().and_then(|e| e.to_str()));

    Ok(Loaded {
        content,
        content_type,
    })
}

/// Lexical containment: keep normal components, drop `.`, reject everything
/// that could climb out of the root before any filesystem call is made
fn sanitize_path(relative: &str) -> Option<PathBuf> {
    let mut clean = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(clean)
}

/// First configured index file that exists in `dir`
fn first_index_file(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    index_files
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Build the file response with `ETag` and Range support
fn build_static_file_response(
    data: &[u8],
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
    range_header: Option<&str>,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(data);
    let total_size = data.len();

    // Client already holds the current bytes
    if cache::etag_matches(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    match http::parse_range_header(range_header, total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);

            let body = if is_head {
                Bytes::new()
            } else {
                Bytes::from(data[start..=end].to_vec())
            };

            http::response::build_partial_response(
                body,
                content_type,
                &etag,
                start,
                end,
                total_size,
                is_head,
            )
        }
        RangeParseResult::NotSatisfiable => http::build_416_response(total_size),
        RangeParseResult::None => {
            let body = if is_head {
                Bytes::new()
            } else {
                Bytes::from(data.to_owned())
            };
            http::response::build_cached_response(body, content_type, &etag, is_head)
        }
    }
}
