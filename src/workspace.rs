//! src/workspace.rs
//! Stages the sidecar, lifecycle scripts and descriptor inside the target
//! directory and removes them again.
//!
//! A [`Workspace`] owns exactly the files it created. They are removed by
//! [`Workspace::cleanup`] or, if the value is dropped first (early return,
//! panic unwinding), by `Drop`. Files that already existed are never touched.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::error::{Dir2RpmError, Result};
use crate::package::descriptor::descriptor_file_name;
use crate::package::sidecar::render_sidecar;
use crate::package::{LifecycleScripts, PackageMetadata, ScriptKind};

/// File naming convention expected by the build tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StagingLayout {
    /// `metadata`, `pre-install`, `post-install`, `pre-uninstall`, `post-uninstall`
    #[default]
    Standard,
    /// `metadata.txt`, `preinst`, `postinst`, `preun`, `postun`
    Legacy,
}

impl StagingLayout {
    pub fn metadata_file(&self) -> &'static str {
        match self {
            StagingLayout::Standard => "metadata",
            StagingLayout::Legacy => "metadata.txt",
        }
    }

    pub fn script_file(&self, kind: ScriptKind) -> &'static str {
        match self {
            StagingLayout::Standard => kind.file_name(),
            StagingLayout::Legacy => kind.legacy_file_name(),
        }
    }
}

#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    created: Vec<PathBuf>,
    released: bool,
}

impl Workspace {
    /// Writes the staged files into `dir`. On error, whatever was already
    /// written is removed before the error is returned.
    #[instrument(skip_all, fields(dir = %dir.display()))]
    pub fn stage(
        dir: &Path,
        layout: StagingLayout,
        descriptor: Option<&str>,
        meta: &PackageMetadata,
        scripts: &LifecycleScripts,
    ) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Dir2RpmError::invalid_input(format!(
                "target directory '{}' does not exist or is not a directory",
                dir.display()
            )));
        }

        // Dropped on any `?` below, which releases the partial set.
        let mut ws = Workspace { dir: dir.to_path_buf(), created: Vec::new(), released: false };

        ws.write_new(layout.metadata_file(), &render_sidecar(meta), None)?;
        for (kind, script) in scripts.iter() {
            ws.write_new(layout.script_file(kind), &script.body, script.mode)?;
        }
        if let Some(text) = descriptor {
            ws.write_new(&descriptor_file_name(meta), text, None)?;
        }

        debug!(files = ws.created.len(), "workspace staged");
        Ok(ws)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staged_files(&self) -> &[PathBuf] {
        &self.created
    }

    /// Removes every staged file. Files already gone are not an error.
    pub fn cleanup(mut self) -> Result<()> {
        let failures = self.release();
        if failures.is_empty() {
            return Ok(());
        }
        let reason = failures
            .iter()
            .map(|(p, e)| format!("{}: {}", p.display(), e))
            .collect::<Vec<_>>()
            .join("; ");
        Err(Dir2RpmError::CleanupFailed { paths: failures.into_iter().map(|(p, _)| p).collect(), reason })
    }

    fn write_new(&mut self, name: &str, contents: &str, mode: Option<u32>) -> Result<()> {
        let path = self.dir.join(name);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Dir2RpmError::invalid_input(format!(
                    "refusing to overwrite existing file '{}'",
                    path.display()
                )));
            }
            Err(e) => return Err(Dir2RpmError::io(format!("could not create '{}'", path.display()), e)),
        };
        self.created.push(path.clone());

        file.write_all(contents.as_bytes())
            .map_err(|e| Dir2RpmError::io(format!("could not write '{}'", path.display()), e))?;
        if let Some(mode) = mode {
            set_mode(&path, mode)
                .map_err(|e| Dir2RpmError::io(format!("could not set permissions on '{}'", path.display()), e))?;
        }
        debug!(path = %path.display(), "staged file");
        Ok(())
    }

    fn release(&mut self) -> Vec<(PathBuf, io::Error)> {
        self.released = true;
        let mut failures = Vec::new();
        for path in self.created.drain(..).rev() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "removed staged file"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove staged file");
                    failures.push((path, e));
                }
            }
        }
        failures
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.release();
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(mode))
        }
    } else {
        fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
            Ok(())
        }
    }
}
