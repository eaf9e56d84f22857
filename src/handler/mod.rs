//! Request handler module
//!
//! Method validation, dispatch, and static file serving. Every path on the
//! server resolves to a file beneath the configured root directory.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::Router;
