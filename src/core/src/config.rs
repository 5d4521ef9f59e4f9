//! Image configuration model and loader.
//!
//! An image configuration is a YAML document describing what goes into an
//! image: package repositories and keys, packages, entrypoint, accounts and
//! OS release metadata. The lifecycle is a pipeline of value transformations:
//!
//! ```text
//! load ──▶ probe_vcs_url (only if vcs-url is empty) ──▶ validate ──▶ build
//! ```
//!
//! After `validate` the configuration is treated as read-only input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ApkoError, Result};

/// Root of an image configuration document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageConfiguration {
    /// Repositories, keys and packages
    pub contents: ImageContents,

    /// Process started when the image runs
    pub entrypoint: ImageEntrypoint,

    /// Default command, independent of the entrypoint
    pub cmd: String,

    /// Working directory of the entrypoint
    pub work_dir: String,

    /// Declared users, groups and the run-as identity
    pub accounts: ImageAccounts,

    /// Environment variables baked into the image
    pub environment: BTreeMap<String, String>,

    /// Architectures to build for
    pub archs: Vec<String>,

    /// Fields used to synthesize `/etc/os-release`
    pub os_release: OsRelease,

    /// Canonical source URL of the configuration
    pub vcs_url: String,
}

/// Package sources and the package set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageContents {
    pub repositories: Vec<String>,
    pub keyring: Vec<String>,
    /// Package names or specs. Duplicates are kept as-is.
    pub packages: Vec<String>,
}

/// Entrypoint declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageEntrypoint {
    /// Entrypoint kind; only `service-bundle` has special meaning
    #[serde(rename = "type")]
    pub type_: String,
    pub command: String,
    pub services: Vec<String>,
    /// Opaque shell snippet passed through to the image
    pub shell_fragment: String,
}

/// Account declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ImageAccounts {
    pub run_as: String,
    pub users: Vec<User>,
    pub groups: Vec<Group>,
}

/// A declared user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
    pub username: String,
    pub uid: u32,
    pub gid: u32,
}

/// A declared group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Group {
    pub groupname: String,
    pub gid: u32,
    pub members: Vec<String>,
}

/// OS release metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OsRelease {
    pub id: String,
    pub name: String,
    pub pretty_name: String,
    pub version_id: String,
    pub home_url: String,
}

impl ImageConfiguration {
    /// Load an image configuration from a YAML file.
    ///
    /// Does not probe for a VCS URL; see [`ImageConfiguration::load_and_probe`].
    ///
    /// # Errors
    ///
    /// - [`ApkoError::Read`] if the file cannot be read
    /// - [`ApkoError::Parse`] if the document does not match the schema
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| ApkoError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::parse(&data, path)?;
        tracing::debug!(path = %path.display(), "Loaded image configuration");
        Ok(config)
    }

    /// Load a configuration and fill in its VCS URL from the enclosing
    /// git repository when the document does not set one.
    ///
    /// Probing is best-effort and never fails this call.
    pub fn load_and_probe(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = Self::load(path)?;
        Ok(config.probe_vcs_url(path))
    }

    /// Parse a configuration from an in-memory YAML document.
    pub fn from_yaml(data: &str) -> Result<Self> {
        Self::parse(data, Path::new("<memory>"))
    }

    fn parse(data: &str, path: &Path) -> Result<Self> {
        // An empty document is an empty configuration.
        if data.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(data).map_err(|e| ApkoError::Parse {
            path: PathBuf::from(path),
            message: e.to_string(),
        })
    }
}

impl OsRelease {
    /// Render the fields as an `/etc/os-release` record.
    ///
    /// Empty fields are omitted.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let fields = [
            ("ID", &self.id, false),
            ("NAME", &self.name, true),
            ("PRETTY_NAME", &self.pretty_name, true),
            ("VERSION_ID", &self.version_id, false),
            ("HOME_URL", &self.home_url, true),
        ];

        for (key, value, quoted) in fields {
            if value.is_empty() {
                continue;
            }
            if quoted {
                out.push_str(&format!("{}=\"{}\"\n", key, value.replace('"', "\\\"")));
            } else {
                out.push_str(&format!("{}={}\n", key, value));
            }
        }

        out
    }
}
