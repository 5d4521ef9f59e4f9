//! Build context and the SBOM step.
//!
//! Runs after the layer tarball is finalized. Every stage is fail-fast and
//! nothing is retried; the caller decides whether a failed SBOM aborts the
//! build.
//!
//! ```text
//! formats? ──no──▶ skip
//!    │yes
//!    ▼
//! layer ──▶ digest ──▶ first tag ──▶ package index ──▶ generator
//! ```

use std::path::PathBuf;

use apko_core::error::{ApkoError, Result};

use crate::layer::TarballLayer;
use crate::packages::PackageIndex;
use crate::reference::ImageReference;
use crate::sbom::{ImageInfo, SbomFormat, SbomGenerator, SbomOptions};

/// The parts of a build session the SBOM step reads.
#[derive(Debug, Clone, Default)]
pub struct BuildContext {
    /// Root filesystem the image was assembled in
    pub work_dir: PathBuf,
    /// Requested SBOM formats; empty disables SBOM generation
    pub sbom_formats: Vec<SbomFormat>,
    /// Finished layer tarball
    pub tarball_path: PathBuf,
    /// Registry tags; only the first is used for the SBOM
    pub tags: Vec<String>,
    /// Target architecture (e.g., "x86_64")
    pub arch: String,
    /// Directory SBOM documents are written to
    pub sbom_path: PathBuf,
}

impl BuildContext {
    /// Generate SBOM documents for the finished layer.
    ///
    /// # Errors
    ///
    /// Each stage reports its own error kind:
    /// [`ApkoError::LayerRead`], [`ApkoError::Digest`], [`ApkoError::TagParse`],
    /// [`ApkoError::PackageIndex`], [`ApkoError::SbomGeneration`].
    pub fn generate_sbom(
        &self,
        index: &impl PackageIndex,
        generator: &impl SbomGenerator,
    ) -> Result<()> {
        if self.sbom_formats.is_empty() {
            tracing::info!("skipping SBOM generation");
            return Ok(());
        }
        tracing::info!(
            tarball = %self.tarball_path.display(),
            formats = self.sbom_formats.len(),
            "generating SBOM"
        );

        let layer = TarballLayer::from_file(&self.tarball_path)?;
        let digest = layer.digest()?;
        tracing::debug!(
            layer = %layer.path().display(),
            size = layer.size()?,
            digest = %digest,
            "Computed layer digest"
        );

        let mut image_info = ImageInfo {
            arch: self.arch.clone(),
            digest,
            ..Default::default()
        };

        if let Some(first) = self.tags.first() {
            let reference = ImageReference::parse_tag(first)?;
            image_info.tag = reference.tag_str().to_string();
            image_info.name = reference.full_reference();
        }

        let packages = index.read_installed(&self.work_dir)?;

        let options = SbomOptions {
            image_info,
            output_dir: self.sbom_path.clone(),
            packages,
            formats: self.sbom_formats.clone(),
        };

        let written = generator.generate(&options).map_err(|e| match e {
            ApkoError::SbomGeneration(_) => e,
            other => ApkoError::SbomGeneration(other.to_string()),
        })?;

        tracing::info!(
            digest = %options.image_info.digest,
            packages = options.packages.len(),
            documents = written.len(),
            output = %self.sbom_path.display(),
            "Generated SBOM"
        );

        Ok(())
    }
}
