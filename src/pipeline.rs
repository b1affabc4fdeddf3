//! src/pipeline.rs
//! Orchestrates one build: validate, render, stage, invoke, resolve, clean up.
//!
//! Every stage reports through a typed `Result`; the first fatal error becomes
//! the run's `BuildResult::Failure`. Staged files are removed on every path
//! once staging succeeded, and cleanup problems never turn a success into a failure.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::checksum::sha256_file;
use crate::config::AppConfig;
use crate::error::{Dir2RpmError, Result};
use crate::invoke::{absolute, invoke, locate_tool};
use crate::outcome::{BuildResult, Stage};
use crate::package::descriptor;
use crate::package::{validate_and_default, Clock, LifecycleScripts, PackageMetadata, RawMetadata};
use crate::resolve::resolve;
use crate::workspace::Workspace;

/// Everything the caller supplies for one run.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    pub source_dir: PathBuf,
    pub fields: RawMetadata,
    pub scripts: LifecycleScripts,
    pub tool_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    pub result: BuildResult,
    /// Build tool stdout; empty if it never ran.
    pub stdout: String,
    pub stderr: String,
    pub metadata: Option<PackageMetadata>,
    pub artifact_sha256: Option<String>,
    pub staged_files: Vec<PathBuf>,
    /// Non-fatal problems (cleanup, checksum) that did not change the result.
    pub warnings: Vec<String>,
}

impl BuildOutcome {
    fn failed(stage: Stage, err: &Dir2RpmError) -> Self {
        warn!(stage = ?stage, error = %err, "build failed");
        BuildOutcome {
            result: BuildResult::failed(stage, err),
            stdout: String::new(),
            stderr: String::new(),
            metadata: None,
            artifact_sha256: None,
            staged_files: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    clock: &'a dyn Clock,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig, clock: &'a dyn Clock) -> Self {
        Pipeline { config, clock }
    }

    /// Directory that receives the finished artifact, made absolute.
    pub fn working_dir(&self, source_dir: &Path) -> Result<PathBuf> {
        let dir = self.config.output_dir.as_deref().unwrap_or(source_dir);
        absolute(dir).map_err(|e| Dir2RpmError::io(format!("could not resolve '{}'", dir.display()), e))
    }

    #[instrument(skip_all, fields(source = %request.source_dir.display()))]
    pub fn run(&self, request: &BuildRequest) -> BuildOutcome {
        let meta = match validate_and_default(&request.fields, &request.source_dir, self.clock) {
            Ok(m) => m,
            Err(e) => return BuildOutcome::failed(Stage::Validation, &e),
        };
        info!(name = %meta.name, version = %meta.version, release = %meta.release, arch = %meta.architecture, "metadata ready");

        // The tool runs in the working directory, so every path it sees must be absolute.
        let source_dir = match request.source_dir.canonicalize() {
            Ok(d) => d,
            Err(e) => {
                let err = Dir2RpmError::io(format!("could not resolve '{}'", request.source_dir.display()), e);
                return with_metadata(BuildOutcome::failed(Stage::Validation, &err), meta);
            }
        };

        let text = match descriptor::render(&meta, &request.scripts, self.clock.today()) {
            Ok(t) => t,
            Err(e) => return with_metadata(BuildOutcome::failed(Stage::Rendering, &e), meta),
        };

        // checked first so a missing tool leaves nothing behind on disk
        let tool = match locate_tool(&request.tool_path) {
            Ok(t) => t,
            Err(e) => return with_metadata(BuildOutcome::failed(Stage::Invocation, &e), meta),
        };
        let working_dir = match self.working_dir(&source_dir).and_then(|dir| ensure_dir(&dir).map(|_| dir)) {
            Ok(d) => d,
            Err(e) => return with_metadata(BuildOutcome::failed(Stage::Staging, &e), meta),
        };

        let staged_descriptor = self.config.write_descriptor.then_some(text.as_str());
        let workspace =
            match Workspace::stage(&source_dir, self.config.layout, staged_descriptor, &meta, &request.scripts) {
                Ok(ws) => ws,
                Err(e) => return with_metadata(BuildOutcome::failed(Stage::Staging, &e), meta),
            };

        let mut outcome = BuildOutcome {
            result: BuildResult::Success { artifact_path: PathBuf::new() },
            stdout: String::new(),
            stderr: String::new(),
            metadata: None,
            artifact_sha256: None,
            staged_files: workspace.staged_files().to_vec(),
            warnings: Vec::new(),
        };
        outcome.result = self.build_and_resolve(&tool, &source_dir, &meta, &working_dir, &mut outcome);

        if let Err(e) = workspace.cleanup() {
            warn!(error = %e, "staged files were not fully removed");
            outcome.warnings.push(e.to_string());
        }

        if let Some(path) = outcome.result.artifact_path() {
            match sha256_file(path) {
                Ok(digest) => outcome.artifact_sha256 = Some(digest),
                Err(e) => outcome.warnings.push(format!("checksum unavailable: {}", e)),
            }
            info!(artifact = %path.display(), "build succeeded");
        }
        with_metadata(outcome, meta)
    }

    fn build_and_resolve(
        &self,
        tool: &Path,
        source_dir: &Path,
        meta: &PackageMetadata,
        working_dir: &Path,
        outcome: &mut BuildOutcome,
    ) -> BuildResult {
        let output = match invoke(tool, source_dir, working_dir, self.config.timeout) {
            Ok(o) => o,
            Err(e) => {
                warn!(error = %e, "build tool did not complete");
                return BuildResult::failed(Stage::Invocation, &e);
            }
        };
        outcome.stdout = output.stdout.clone();
        outcome.stderr = output.stderr.clone();

        if let Some(err) = output.failure() {
            warn!(exit_code = ?output.exit_code, "build tool reported failure");
            return BuildResult::failed(Stage::Invocation, &err);
        }

        let result = resolve(meta, working_dir, &self.config.build_root, &self.config.resolve_options());
        if let Some(failure) = result.failure() {
            warn!(diagnostic = %failure.diagnostic, "artifact resolution failed");
        }
        result
    }
}

fn with_metadata(mut outcome: BuildOutcome, meta: PackageMetadata) -> BuildOutcome {
    outcome.metadata = Some(meta);
    outcome
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir)
        .map_err(|e| Dir2RpmError::io(format!("could not create output directory '{}'", dir.display()), e))
}
