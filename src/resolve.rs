//! src/resolve.rs
//! Finds the artifact the build tool produced and moves it to its canonical place.
//!
//! Probe order, first hit wins:
//! 1. `<build_root>/<arch>/<candidate>`, moved into the working directory
//! 2. `<working_dir>/<candidate>`, left in place
//! 3. any `*.<ext>` one level below `<build_root>/*/`
//! 4. any `*.<ext>` directly in `<working_dir>`
//!
//! Rules 3 and 4 only gather evidence for the diagnostic; they never yield success.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::error::{Dir2RpmError, Result};
use crate::outcome::{BuildResult, Stage};
use crate::package::PackageMetadata;

/// What to do when the canonical output path is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    #[default]
    Overwrite,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub extension: String,
    pub on_collision: CollisionPolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolveOptions { extension: "rpm".to_string(), on_collision: CollisionPolicy::Overwrite }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Relocated { from: PathBuf, to: PathBuf },
    InPlace(PathBuf),
}

impl Resolution {
    pub fn path(&self) -> &Path {
        match self {
            Resolution::Relocated { to, .. } => to,
            Resolution::InPlace(p) => p,
        }
    }
}

pub fn resolve(meta: &PackageMetadata, working_dir: &Path, build_root: &Path, opts: &ResolveOptions) -> BuildResult {
    match locate(meta, working_dir, build_root, opts) {
        Ok(found) => BuildResult::Success { artifact_path: found.path().to_path_buf() },
        Err(e) => BuildResult::failed(Stage::Resolution, &e),
    }
}

#[instrument(skip_all, fields(name = %meta.name, working_dir = %working_dir.display(), build_root = %build_root.display()))]
pub fn locate(meta: &PackageMetadata, working_dir: &Path, build_root: &Path, opts: &ResolveOptions) -> Result<Resolution> {
    let extension = opts.extension.trim_start_matches('.');
    let expected = meta.artifact_name(extension);
    let in_build_root = build_root.join(meta.architecture.as_str()).join(&expected);
    let in_working_dir = working_dir.join(&expected);

    if in_build_root.is_file() {
        if same_file(&in_build_root, &in_working_dir) {
            info!(path = %in_working_dir.display(), "artifact already in working directory");
            return Ok(Resolution::InPlace(in_working_dir));
        }
        relocate(&in_build_root, &in_working_dir, opts.on_collision)?;
        info!(from = %in_build_root.display(), to = %in_working_dir.display(), "artifact relocated");
        return Ok(Resolution::Relocated { from: in_build_root, to: in_working_dir });
    }
    if in_working_dir.is_file() {
        info!(path = %in_working_dir.display(), "artifact found in working directory");
        return Ok(Resolution::InPlace(in_working_dir));
    }

    let build_root_glob = build_root.join("*").join(format!("*.{}", extension));
    let working_dir_glob = working_dir.join(format!("*.{}", extension));
    let probed = vec![in_build_root, in_working_dir, build_root_glob, working_dir_glob];

    let mut candidates = scan(build_root, 2, extension);
    if candidates.is_empty() {
        candidates = scan(working_dir, 1, extension);
    }
    if !candidates.is_empty() {
        warn!(expected = %expected, found = candidates.len(), "no exact artifact, but other packages exist");
    }
    Err(Dir2RpmError::ArtifactNotFound { expected, probed, candidates })
}

/// Files with `extension` exactly `depth` levels below `root`, sorted.
fn scan(root: &Path, depth: usize, extension: &str) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(depth)
        .max_depth(depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|x| x.to_str())
                .map_or(false, |x| x.eq_ignore_ascii_case(extension))
        })
        .map(|e| e.into_path())
        .collect();
    found.sort();
    debug!(root = %root.display(), hits = found.len(), "wildcard scan");
    found
}

fn relocate(from: &Path, to: &Path, policy: CollisionPolicy) -> Result<()> {
    if to.exists() {
        match policy {
            CollisionPolicy::Fail => return Err(Dir2RpmError::ArtifactCollision { path: to.to_path_buf() }),
            CollisionPolicy::Overwrite => warn!(path = %to.display(), "replacing existing artifact"),
        }
    }
    if let Err(e) = fs::rename(from, to) {
        // typically EXDEV when the build root lives on another filesystem
        debug!(error = %e, "rename failed, falling back to copy");
        fs::copy(from, to)
            .and_then(|_| fs::remove_file(from))
            .map_err(|source| Dir2RpmError::RelocationFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            })?;
    }
    Ok(())
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
