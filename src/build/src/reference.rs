//! Registry tag parsing.
//!
//! Parses references like `ghcr.io/wolfi-dev/nginx:1.25` into structured
//! components. Only the first configured tag of a build feeds the SBOM image
//! identity.

use apko_core::error::{ApkoError, Result};
use oci_distribution::Reference;

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/alpine", "wolfi-dev/nginx")
    pub repository: String,
    /// Tag (e.g., "latest", "1.25")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `alpine` → docker.io/library/alpine:latest
    /// - `alpine:3.16` → docker.io/library/alpine:3.16
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    pub fn parse(reference: &str) -> Result<Self> {
        let oci_ref = parse_oci(reference)?;
        Ok(Self::from_oci(&oci_ref, oci_ref.registry()))
    }

    /// Parse a registry tag, as used for `--tag` style build options.
    ///
    /// Stricter than [`ImageReference::parse`]: digests are rejected. Docker
    /// Hub tags resolve to the `index.docker.io` endpoint, so `alpine` names
    /// `index.docker.io/library/alpine:latest`.
    pub fn parse_tag(tag: &str) -> Result<Self> {
        let oci_ref = parse_oci(tag)?;

        if oci_ref.digest().is_some() {
            return Err(tag_error(tag, "a tag reference may not contain a digest"));
        }

        Ok(Self::from_oci(&oci_ref, oci_ref.resolve_registry()))
    }

    fn from_oci(oci_ref: &Reference, registry: &str) -> Self {
        ImageReference {
            registry: registry.to_string(),
            repository: oci_ref.repository().to_string(),
            tag: oci_ref.tag().map(str::to_string),
            digest: oci_ref.digest().map(str::to_string),
        }
    }

    /// The tag, or `latest` when none was given.
    pub fn tag_str(&self) -> &str {
        self.tag.as_deref().unwrap_or(DEFAULT_TAG)
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

fn tag_error(tag: &str, message: &str) -> ApkoError {
    ApkoError::TagParse {
        tag: tag.to_string(),
        message: message.to_string(),
    }
}

/// Parse against the distribution reference grammar.
fn parse_oci(reference: &str) -> Result<Reference> {
    reference
        .trim()
        .parse::<Reference>()
        .map_err(|e| tag_error(reference, &e.to_string()))
}
