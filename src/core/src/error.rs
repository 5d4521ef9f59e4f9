use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// apko error types
#[derive(Error, Debug)]
pub enum ApkoError {
    /// Configuration document could not be read
    #[error("failed to read image configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration document is not valid YAML for the schema
    #[error("failed to parse image configuration {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    /// First invalid user or group found during validation
    #[error("Configuration error: {0}")]
    Configuration(ConfigViolation),

    /// Layer tarball could not be opened or interpreted
    #[error("failed to create OCI layer from {}: {message}", .path.display())]
    LayerRead { path: PathBuf, message: String },

    /// Layer digest could not be computed
    #[error("could not calculate layer digest for {}: {message}", .path.display())]
    Digest { path: PathBuf, message: String },

    /// Registry tag is not a valid image reference
    #[error("parsing tag {tag}: {message}")]
    TagParse { tag: String, message: String },

    /// Installed package index could not be read
    #[error("getting installed packages from {}: {message}", .path.display())]
    PackageIndex { path: PathBuf, message: String },

    /// SBOM generator failed
    #[error("generating SBOMs: {0}")]
    SbomGeneration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ApkoError {
    /// Short, stable name of the stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            ApkoError::Read { .. } => "read",
            ApkoError::Parse { .. } => "parse",
            ApkoError::Configuration(_) => "validate",
            ApkoError::LayerRead { .. } => "layer",
            ApkoError::Digest { .. } => "digest",
            ApkoError::TagParse { .. } => "tag",
            ApkoError::PackageIndex { .. } => "package-index",
            ApkoError::SbomGeneration(_) => "sbom",
            ApkoError::Io(_) => "io",
            ApkoError::Other(_) => "other",
        }
    }
}

/// Which kind of account failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountEntity {
    User,
    Group,
}

impl fmt::Display for AccountEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Why an account failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationReason {
    /// Username or group name is empty
    MissingName,
    /// UID or GID is 0
    RootId,
}

/// A single failed account check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigViolation {
    pub entity: AccountEntity,
    /// Declared name (may be empty)
    pub name: String,
    /// Declared UID for users, GID for groups
    pub id: u32,
    pub reason: ViolationReason,
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id_label = match self.entity {
            AccountEntity::User => "UID",
            AccountEntity::Group => "GID",
        };
        match self.reason {
            ViolationReason::MissingName => write!(
                f,
                "configured {} with {} {} has no configured {} name",
                self.entity, id_label, self.id, self.entity
            ),
            ViolationReason::RootId => write!(
                f,
                "configured {} '{}' has {} 0",
                self.entity, self.name, id_label
            ),
        }
    }
}

impl From<ConfigViolation> for ApkoError {
    fn from(violation: ConfigViolation) -> Self {
        ApkoError::Configuration(violation)
    }
}

/// Result type alias for apko operations
pub type Result<T> = std::result::Result<T, ApkoError>;
