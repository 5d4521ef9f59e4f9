//! Integration test: configuration pipeline followed by the SBOM step.
//!
//! Loads a configuration from disk, probes its VCS URL from a scratch git
//! repository, validates it, then runs SBOM generation over a freshly built
//! layer and installed database.

use std::cell::RefCell;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use apko_build::{ApkInstalledDb, BuildContext, SbomFormat, SbomGenerator, SbomOptions};
use apko_core::{ApkoError, ImageConfiguration, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::TempDir;

const CONFIG: &str = r#"
contents:
  repositories:
    - https://packages.wolfi.dev/os
  packages:
    - wolfi-base
entrypoint:
  type: service-bundle
  services:
    - nginx
accounts:
  run-as: nginx
  users:
    - username: nginx
      uid: 65532
      gid: 65532
  groups:
    - groupname: nginx
      gid: 65532
      members: [nginx]
"#;

#[derive(Default)]
struct CollectingGenerator {
    seen: RefCell<Vec<SbomOptions>>,
}

impl SbomGenerator for CollectingGenerator {
    fn generate(&self, options: &SbomOptions) -> Result<Vec<PathBuf>> {
        self.seen.borrow_mut().push(options.clone());
        let mut written = Vec::new();
        for format in &options.formats {
            let path = options
                .output_dir
                .join(format!("sbom-{}.{}", options.image_info.arch, format.extension()));
            fs::write(&path, format!("{}\n", options.image_info.digest))?;
            written.push(path);
        }
        Ok(written)
    }
}

fn write_layer(path: &Path) {
    let mut builder = tar::Builder::new(Vec::new());
    let content = b"ID=wolfi\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "etc/os-release", &content[..])
        .unwrap();
    let tar = builder.into_inner().unwrap();

    let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
    encoder.write_all(&tar).unwrap();
    encoder.finish().unwrap();
}

#[test]
fn test_configuration_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    let git_dir = temp_dir.path().join(".git");
    fs::create_dir_all(git_dir.join("objects")).unwrap();
    fs::write(git_dir.join("HEAD"), "ref: refs/heads/main\n").unwrap();
    fs::write(
        git_dir.join("config"),
        "[remote \"origin\"]\n\turl = git@github.com:wolfi-dev/images.git\n",
    )
    .unwrap();

    let config_path = temp_dir.path().join("nginx.apko.yaml");
    fs::write(&config_path, CONFIG).unwrap();

    let ic = ImageConfiguration::load_and_probe(&config_path)
        .unwrap()
        .validate()
        .unwrap();

    assert_eq!(ic.vcs_url, "git+ssh://git@github.com/wolfi-dev/images.git");
    assert_eq!(ic.entrypoint.command, "/bin/s6-svscan /sv");
    assert_eq!(ic.contents.packages, vec!["wolfi-base", "s6"]);
    assert_eq!(ic.os_release.id, "alpine");

    let lines = ic.summary_lines();
    assert!(lines.contains(&"      - uid=65532(nginx) gid=65532".to_string()));
    assert!(lines.contains(&"      - gid=65532(nginx) members=[nginx]".to_string()));
}

#[test]
fn test_configuration_rejects_root() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("root.apko.yaml");
    fs::write(
        &config_path,
        "accounts:\n  users:\n    - username: root\n      uid: 0\n      gid: 0\n",
    )
    .unwrap();

    let err = ImageConfiguration::load_and_probe(&config_path)
        .unwrap()
        .validate()
        .unwrap_err();
    assert!(matches!(err, ApkoError::Configuration(_)));
    assert!(err.to_string().contains("root"));
}

#[test]
fn test_sbom_step() {
    let temp_dir = TempDir::new().unwrap();
    let work_dir = temp_dir.path().join("work");
    let db = ApkInstalledDb::db_path(&work_dir);
    fs::create_dir_all(db.parent().unwrap()).unwrap();
    fs::write(
        &db,
        "P:wolfi-base\nV:1-r4\nA:x86_64\nL:MIT\n\nP:s6\nV:2.11.3.2-r0\nA:x86_64\nL:ISC\n",
    )
    .unwrap();

    let tarball_path = temp_dir.path().join("layer.tar.gz");
    write_layer(&tarball_path);

    let sbom_path = temp_dir.path().join("sbom");
    fs::create_dir_all(&sbom_path).unwrap();

    let ctx = BuildContext {
        work_dir,
        sbom_formats: vec!["spdx".parse().unwrap(), SbomFormat::CycloneDx],
        tarball_path,
        tags: vec!["cgr.dev/chainguard/nginx:latest".to_string()],
        arch: "x86_64".to_string(),
        sbom_path: sbom_path.clone(),
    };
    let generator = CollectingGenerator::default();

    ctx.generate_sbom(&ApkInstalledDb::new(), &generator).unwrap();

    let seen = generator.seen.borrow();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].image_info.name, "cgr.dev/chainguard/nginx:latest");
    assert_eq!(seen[0].packages.len(), 2);
    assert!(sbom_path.join("sbom-x86_64.spdx.json").exists());
    assert!(sbom_path.join("sbom-x86_64.cdx").exists());
}
