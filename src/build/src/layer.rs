//! Filesystem layer handle over a finished tarball.
//!
//! Gives a produced layer its content-addressed identity: the digest of the
//! compressed blob as pushed to a registry, and the diff ID of the
//! uncompressed tar stream.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use apko_core::error::{ApkoError, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sha2::{Digest, Sha256};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const TAR_MAGIC_OFFSET: usize = 257;
const TAR_MAGIC: &[u8; 5] = b"ustar";

/// How the layer blob is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCompression {
    Gzip,
    None,
}

/// A layer backed by a tarball on disk.
#[derive(Debug, Clone)]
pub struct TarballLayer {
    path: PathBuf,
    compression: LayerCompression,
}

impl TarballLayer {
    /// Open a layer from a `.tar.gz` or plain `.tar` file.
    ///
    /// # Errors
    ///
    /// Returns [`ApkoError::LayerRead`] if the file cannot be opened or is
    /// neither gzip-compressed nor a tar archive.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| layer_error(path, e))?;

        let mut header = Vec::with_capacity(512);
        file.by_ref()
            .take(512)
            .read_to_end(&mut header)
            .map_err(|e| layer_error(path, e))?;

        let compression = if header.starts_with(&GZIP_MAGIC) {
            LayerCompression::Gzip
        } else if header.len() >= TAR_MAGIC_OFFSET + TAR_MAGIC.len()
            && &header[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()] == TAR_MAGIC
        {
            LayerCompression::None
        } else {
            return Err(layer_error(path, "not a gzip-compressed or plain tar archive"));
        };

        let layer = Self {
            path: path.to_path_buf(),
            compression,
        };
        layer.check_first_entry()?;

        tracing::debug!(layer = %path.display(), ?compression, "Opened layer tarball");
        Ok(layer)
    }

    /// Path of the blob on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn compression(&self) -> LayerCompression {
        self.compression
    }

    /// Digest of the compressed blob, as `sha256:<hex>`.
    ///
    /// Plain tarballs are gzip-compressed on the fly first.
    pub fn digest(&self) -> Result<String> {
        let mut file = self.open()?;

        let hasher = match self.compression {
            LayerCompression::Gzip => {
                let mut hasher = Sha256::new();
                io::copy(&mut file, &mut hasher).map_err(|e| self.digest_error(e))?;
                hasher
            }
            LayerCompression::None => {
                let mut encoder = GzEncoder::new(Sha256::new(), flate2::Compression::default());
                io::copy(&mut file, &mut encoder).map_err(|e| self.digest_error(e))?;
                encoder.finish().map_err(|e| self.digest_error(e))?
            }
        };

        Ok(format_digest(hasher))
    }

    /// Digest of the uncompressed tar stream, as `sha256:<hex>`.
    pub fn diff_id(&self) -> Result<String> {
        let file = self.open()?;
        let mut hasher = Sha256::new();

        match self.compression {
            LayerCompression::Gzip => {
                let mut decoder = GzDecoder::new(file);
                io::copy(&mut decoder, &mut hasher).map_err(|e| self.digest_error(e))?;
            }
            LayerCompression::None => {
                let mut file = file;
                io::copy(&mut file, &mut hasher).map_err(|e| self.digest_error(e))?;
            }
        }

        Ok(format_digest(hasher))
    }

    /// Size of the blob on disk in bytes.
    pub fn size(&self) -> Result<u64> {
        std::fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| self.digest_error(e))
    }

    /// Read the first tar header so corrupt archives fail at open time.
    fn check_first_entry(&self) -> Result<()> {
        let file = File::open(&self.path).map_err(|e| layer_error(&self.path, e))?;
        let reader: Box<dyn Read> = match self.compression {
            LayerCompression::Gzip => Box::new(GzDecoder::new(file)),
            LayerCompression::None => Box::new(file),
        };

        let mut archive = tar::Archive::new(reader);
        let mut entries = archive.entries().map_err(|e| layer_error(&self.path, e))?;
        if let Some(Err(e)) = entries.next() {
            return Err(layer_error(&self.path, e));
        }
        Ok(())
    }

    fn open(&self) -> Result<File> {
        File::open(&self.path).map_err(|e| self.digest_error(e))
    }

    fn digest_error(&self, e: impl std::fmt::Display) -> ApkoError {
        ApkoError::Digest {
            path: self.path.clone(),
            message: e.to_string(),
        }
    }
}

fn layer_error(path: &Path, e: impl std::fmt::Display) -> ApkoError {
    ApkoError::LayerRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

fn format_digest(hasher: Sha256) -> String {
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn sha256_hex(data: &[u8]) -> String {
        format!("sha256:{}", hex::encode(Sha256::digest(data)))
    }

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, content) in files {
            let mut header = tar::Header::new_ustar();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *content).unwrap();
        }
        builder.into_inner().unwrap()
    }

    // Helper function to create a test tar.gz layer
    pub(crate) fn create_test_layer(path: &Path, files: &[(&str, &[u8])]) {
        use flate2::Compression;
        use std::io::Write;

        let file = File::create(path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&tar_bytes(files)).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_gzip_layer_digest_is_blob_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar.gz");
        create_test_layer(&path, &[("etc/os-release", b"ID=alpine\n")]);

        let layer = TarballLayer::from_file(&path).unwrap();
        assert_eq!(layer.compression(), LayerCompression::Gzip);
        assert_eq!(layer.path(), path.as_path());
        assert_eq!(layer.size().unwrap(), fs::metadata(&path).unwrap().len());
        assert_eq!(layer.digest().unwrap(), sha256_hex(&fs::read(&path).unwrap()));
    }

    #[test]
    fn test_digest_after_file_removed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar.gz");
        create_test_layer(&path, &[("etc/os-release", b"ID=alpine\n")]);

        let layer = TarballLayer::from_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let err = layer.digest().unwrap_err();
        assert!(matches!(err, ApkoError::Digest { .. }));
        assert_eq!(err.stage(), "digest");
        assert!(matches!(layer.size().unwrap_err(), ApkoError::Digest { .. }));
    }

    #[test]
    fn test_gzip_layer_diff_id_is_tar_hash() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar.gz");
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello"), ("dir/b.txt", b"world")];
        create_test_layer(&path, files);

        let layer = TarballLayer::from_file(&path).unwrap();
        assert_eq!(layer.diff_id().unwrap(), sha256_hex(&tar_bytes(files)));
    }

    #[test]
    fn test_plain_tar_layer() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar");
        let data = tar_bytes(&[("a.txt", b"hello")]);
        fs::write(&path, &data).unwrap();

        let layer = TarballLayer::from_file(&path).unwrap();
        assert_eq!(layer.compression(), LayerCompression::None);
        assert_eq!(layer.diff_id().unwrap(), sha256_hex(&data));

        let digest = layer.digest().unwrap();
        assert!(digest.starts_with("sha256:"));
        assert_eq!(digest.len(), "sha256:".len() + 64);
        assert_ne!(digest, sha256_hex(&data));
        // deterministic across calls
        assert_eq!(digest, layer.digest().unwrap());
    }

    #[test]
    fn test_missing_layer() {
        let temp_dir = TempDir::new().unwrap();
        let err = TarballLayer::from_file(temp_dir.path().join("missing.tar.gz")).unwrap_err();
        assert!(matches!(err, ApkoError::LayerRead { .. }));
    }

    #[test]
    fn test_not_a_tarball() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar.gz");
        fs::write(&path, b"definitely not an archive").unwrap();

        let err = TarballLayer::from_file(&path).unwrap_err();
        assert!(matches!(err, ApkoError::LayerRead { .. }));
        assert_eq!(err.stage(), "layer");
    }

    #[test]
    fn test_gzip_of_garbage_is_layer_error() {
        use flate2::Compression;
        use std::io::Write;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("layer.tar.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(&[0xab; 1024]).unwrap();
        encoder.finish().unwrap();

        let err = TarballLayer::from_file(&path).unwrap_err();
        assert!(matches!(err, ApkoError::LayerRead { .. }));
    }
}
