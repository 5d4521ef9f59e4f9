//! Best-effort VCS URL detection.
//!
//! Reads the `origin` remote of the git repository rooted at the directory
//! holding the configuration file. Every failure degrades to "no URL": the
//! VCS URL is optional metadata and must never fail a build.

use std::path::{Path, PathBuf};

use url::Url;

use crate::config::ImageConfiguration;

const GIT_DIR: &str = ".git";
const ORIGIN: &str = "origin";

/// Probe the `origin` remote of the repository next to `config_path`.
///
/// Returns the normalized remote URL, or `None` when there is no parent
/// directory, no repository, no `origin` remote, or the URL is unusable.
pub fn probe_vcs_url(config_path: &Path) -> Option<String> {
    let parent = match config_path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => {
            tracing::debug!(path = %config_path.display(), "No parent directory, skipping VCS probe");
            return None;
        }
    };

    let git_dir = match open_repository(parent) {
        Some(dir) => dir,
        None => {
            tracing::info!(
                dir = %parent.display(),
                "unable to determine git vcs url: repository does not exist"
            );
            return None;
        }
    };

    let config = match std::fs::read_to_string(config_file(&git_dir)) {
        Ok(c) => c,
        Err(e) => {
            tracing::info!(dir = %git_dir.display(), "unable to determine git vcs url: {}", e);
            return None;
        }
    };

    let remote = match remote_url(&config, ORIGIN) {
        Some(url) => url,
        None => {
            tracing::info!(dir = %git_dir.display(), "unable to determine git vcs url: remote not found");
            return None;
        }
    };

    normalize_remote_url(&remote)
}

/// Normalize a git remote URL.
///
/// URLs that do not parse are taken to be scp-style SSH shorthand
/// (`user@host:path`) and rewritten to `git+ssh://user@host/path`.
/// Remotes without any `:` are local paths and are returned verbatim.
pub fn normalize_remote_url(remote: &str) -> Option<String> {
    let remote = remote.trim();
    if remote.is_empty() {
        return None;
    }

    // Parsed URLs come back in canonical form: the host is lowercased and
    // an empty path becomes `/`.
    if let Ok(url) = Url::parse(remote) {
        return Some(url.to_string());
    }

    if !remote.contains(':') {
        return Some(remote.to_string());
    }

    let rewritten = format!("git+ssh://{}", remote.replacen(':', "/", 1));
    match Url::parse(&rewritten) {
        Ok(url) => Some(url.to_string()),
        Err(e) => {
            tracing::warn!("unable to parse {} as a git vcs url: {}", rewritten, e);
            None
        }
    }
}

impl ImageConfiguration {
    /// Fill `vcs_url` from the repository enclosing `config_path`.
    ///
    /// A URL already present in the document is kept. Never fails.
    pub fn probe_vcs_url(mut self, config_path: impl AsRef<Path>) -> Self {
        if !self.vcs_url.is_empty() {
            return self;
        }

        if let Some(url) = probe_vcs_url(config_path.as_ref()) {
            tracing::info!("detected {} as VCS URL", url);
            self.vcs_url = url;
        }
        self
    }
}

/// Locate the git directory of a repository rooted exactly at `dir`.
///
/// Handles a `.git` directory, a `.git` file pointing elsewhere
/// (`gitdir: <path>`, used by worktrees and submodules), and bare
/// repositories.
fn open_repository(dir: &Path) -> Option<PathBuf> {
    let dot_git = dir.join(GIT_DIR);

    if dot_git.is_dir() {
        return Some(dot_git);
    }

    if dot_git.is_file() {
        let contents = std::fs::read_to_string(&dot_git).ok()?;
        let target = contents.trim().strip_prefix("gitdir:")?.trim();
        let target = Path::new(target);
        let resolved = if target.is_absolute() {
            target.to_path_buf()
        } else {
            dir.join(target)
        };
        return resolved.is_dir().then_some(resolved);
    }

    let is_bare = dir.join("HEAD").is_file()
        && dir.join("config").is_file()
        && dir.join("objects").is_dir();
    is_bare.then(|| dir.to_path_buf())
}

/// Path of the config file for a git directory, following `commondir`
/// for linked worktrees.
fn config_file(git_dir: &Path) -> PathBuf {
    if let Ok(common) = std::fs::read_to_string(git_dir.join("commondir")) {
        let common = Path::new(common.trim());
        let common = if common.is_absolute() {
            common.to_path_buf()
        } else {
            git_dir.join(common)
        };
        return common.join("config");
    }
    git_dir.join("config")
}

/// First `url` of `[remote "<name>"]` in a git config file.
fn remote_url(config: &str, name: &str) -> Option<String> {
    let mut in_remote = false;

    for line in config.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            in_remote = parse_section(line)
                .map(|(section, sub)| {
                    section.eq_ignore_ascii_case("remote") && sub.as_deref() == Some(name)
                })
                .unwrap_or(false);
            continue;
        }

        if !in_remote {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            if key.trim().eq_ignore_ascii_case("url") {
                return Some(unquote(strip_inline_comment(value).trim()));
            }
        }
    }

    None
}

/// Split `[section "subsection"]` into its parts.
fn parse_section(line: &str) -> Option<(String, Option<String>)> {
    let inner = line.strip_prefix('[')?.split(']').next()?.trim();
    match inner.split_once(char::is_whitespace) {
        Some((section, rest)) => {
            let sub = rest.trim().trim_matches('"').to_string();
            Some((section.to_string(), Some(sub)))
        }
        None => Some((inner.to_string(), None)),
    }
}

/// Cut a value at the first `#` or `;` that is outside double quotes.
fn strip_inline_comment(value: &str) -> &str {
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => quoted = !quoted,
            '#' | ';' if !quoted => return &value[..i],
            _ => {}
        }
    }
    value
}

fn unquote(value: &str) -> String {
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value);
    value.replace("\\\"", "\"").replace("\\\\", "\\")
}
