//! Installed package index.
//!
//! The SBOM lists the packages installed into the image's work directory.
//! [`PackageIndex`] is the seam; [`ApkInstalledDb`] reads apk's installed
//! database, a sequence of blank-line separated stanzas of `K:value` lines.

use std::path::{Path, PathBuf};

use apko_core::error::{ApkoError, Result};
use serde::Serialize;

/// Location of the installed database relative to the work directory.
pub const APK_INSTALLED_DB: &str = "lib/apk/db/installed";

/// An installed package as reported to the SBOM generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub license: String,
    /// Source package this was built from
    pub origin: String,
    pub description: String,
    pub url: String,
    /// Package checksum as recorded by apk (`Q1...`)
    pub checksum: String,
    pub size: u64,
    pub installed_size: u64,
}

/// Source of the installed package list for a build.
pub trait PackageIndex {
    /// Packages installed under `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ApkoError::PackageIndex`] if the index cannot be read.
    fn read_installed(&self, work_dir: &Path) -> Result<Vec<Package>>;
}

/// Reader for apk's `lib/apk/db/installed`.
#[derive(Debug, Clone, Default)]
pub struct ApkInstalledDb;

impl ApkInstalledDb {
    pub fn new() -> Self {
        Self
    }

    /// Path of the installed database under `work_dir`.
    pub fn db_path(work_dir: &Path) -> PathBuf {
        work_dir.join(APK_INSTALLED_DB)
    }
}

impl PackageIndex for ApkInstalledDb {
    fn read_installed(&self, work_dir: &Path) -> Result<Vec<Package>> {
        let path = Self::db_path(work_dir);
        let data = std::fs::read_to_string(&path).map_err(|e| ApkoError::PackageIndex {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let packages = parse_installed(&data).map_err(|message| ApkoError::PackageIndex {
            path: path.clone(),
            message,
        })?;

        tracing::debug!(
            db = %path.display(),
            count = packages.len(),
            "Read installed package index"
        );

        Ok(packages)
    }
}

/// Parse the contents of an installed database.
///
/// Unknown keys (file lists, dependencies, triggers) are skipped.
pub fn parse_installed(data: &str) -> std::result::Result<Vec<Package>, String> {
    let mut packages = Vec::new();
    let mut current: Option<Package> = None;

    for (lineno, line) in data.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(pkg) = current.take() {
                packages.push(finish(pkg, lineno)?);
            }
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| format!("line {}: expected 'K:value', got '{}'", lineno + 1, line))?;

        let pkg = current.get_or_insert_with(Package::default);
        match key {
            "P" => pkg.name = value.to_string(),
            "V" => pkg.version = value.to_string(),
            "A" => pkg.arch = value.to_string(),
            "L" => pkg.license = value.to_string(),
            "o" => pkg.origin = value.to_string(),
            "T" => pkg.description = value.to_string(),
            "U" => pkg.url = value.to_string(),
            "C" => pkg.checksum = value.to_string(),
            "S" => pkg.size = parse_size(value, lineno)?,
            "I" => pkg.installed_size = parse_size(value, lineno)?,
            _ => {}
        }
    }

    if let Some(pkg) = current.take() {
        packages.push(finish(pkg, data.lines().count())?);
    }

    Ok(packages)
}

fn finish(pkg: Package, lineno: usize) -> std::result::Result<Package, String> {
    if pkg.name.is_empty() {
        return Err(format!("package stanza ending at line {} has no name", lineno));
    }
    Ok(pkg)
}

fn parse_size(value: &str, lineno: usize) -> std::result::Result<u64, String> {
    value
        .trim()
        .parse()
        .map_err(|e| format!("line {}: invalid size '{}': {}", lineno + 1, value, e))
}
