//! SBOM generator interface.
//!
//! Document writers live outside this crate. The orchestrator hands them a
//! fully assembled [`SbomOptions`] and expects either all requested documents
//! on disk or an error.

use std::path::PathBuf;

use apko_core::error::Result;
use serde::Serialize;

use crate::packages::Package;

/// SBOM output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SbomFormat {
    /// SPDX JSON
    Spdx,
    /// CycloneDX JSON
    CycloneDx,
    /// apk installed database copy
    Idb,
}

impl SbomFormat {
    /// File extension used for documents of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Spdx => "spdx.json",
            Self::CycloneDx => "cdx",
            Self::Idb => "idb",
        }
    }
}

impl std::fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spdx => write!(f, "spdx"),
            Self::CycloneDx => write!(f, "cyclonedx"),
            Self::Idb => write!(f, "idb"),
        }
    }
}

impl std::str::FromStr for SbomFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spdx" => Ok(Self::Spdx),
            "cyclonedx" => Ok(Self::CycloneDx),
            "idb" => Ok(Self::Idb),
            _ => Err(format!(
                "unknown sbom format: '{}' (supported: spdx, cyclonedx, idb)",
                s
            )),
        }
    }
}

/// Identity of the image the SBOM describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    /// Tag of the first configured registry tag (e.g., "latest")
    pub tag: String,
    /// Fully qualified reference of the first tag
    pub name: String,
    pub arch: String,
    /// Layer digest, `sha256:<hex>`
    pub digest: String,
}

/// Everything a generator needs to write SBOM documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SbomOptions {
    pub image_info: ImageInfo,
    pub output_dir: PathBuf,
    pub packages: Vec<Package>,
    pub formats: Vec<SbomFormat>,
}

/// Writes SBOM documents.
///
/// A call either produces every requested document or fails; callers treat
/// anything written by a failed call as invalid.
pub trait SbomGenerator {
    /// Write one document per requested format, returning their paths.
    fn generate(&self, options: &SbomOptions) -> Result<Vec<PathBuf>>;
}
