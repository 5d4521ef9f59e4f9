//! apko build - post-processing of finished build artifacts.
//!
//! Turns a finished filesystem layer into SBOM generator input: the layer's
//! content digest, the image identity from the first registry tag, and the
//! installed package list.

pub mod context;
pub mod layer;
pub mod packages;
pub mod reference;
pub mod sbom;

// Re-export common types
pub use context::BuildContext;
pub use layer::{LayerCompression, TarballLayer};
pub use packages::{ApkInstalledDb, Package, PackageIndex};
pub use reference::ImageReference;
pub use sbom::{ImageInfo, SbomFormat, SbomGenerator, SbomOptions};

/// apko build version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
