//! apko core - image configuration model and preflight checks
//!
//! This crate provides the image configuration schema, its loader, a
//! best-effort VCS URL prober, the validator/normalizer and a diagnostic
//! summarizer, plus the error type shared by the build crate.

pub mod config;
pub mod error;
pub mod summary;
pub mod validate;
pub mod vcs;

// Re-export commonly used types
pub use config::{
    Group, ImageAccounts, ImageConfiguration, ImageContents, ImageEntrypoint, OsRelease, User,
};
pub use error::{AccountEntity, ApkoError, ConfigViolation, Result, ViolationReason};
pub use validate::{SERVICE_BUNDLE_COMMAND, SERVICE_BUNDLE_PACKAGE, SERVICE_BUNDLE_TYPE};
pub use vcs::{normalize_remote_url, probe_vcs_url};

/// apko core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
