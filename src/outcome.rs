//! src/outcome.rs
//! The value every orchestration run ends with.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Dir2RpmError, ErrorKind};

/// Pipeline stage a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validation,
    Rendering,
    Staging,
    Invocation,
    Resolution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub exit_code: Option<i32>,
    /// Build tool stderr, verbatim. Empty when the tool never ran.
    pub stderr: String,
    pub diagnostic: String,
    /// Locations checked while looking for the artifact.
    pub probed: Vec<PathBuf>,
    /// Package files found by the wildcard scans.
    pub candidates: Vec<PathBuf>,
}

impl Failure {
    pub fn from_error(stage: Stage, err: &Dir2RpmError) -> Self {
        let mut failure = Failure {
            stage,
            kind: err.kind(),
            exit_code: None,
            stderr: String::new(),
            diagnostic: err.to_string(),
            probed: Vec::new(),
            candidates: Vec::new(),
        };
        match err {
            Dir2RpmError::ToolExecutionFailed { exit_code, stderr, .. } => {
                failure.exit_code = *exit_code;
                failure.stderr = stderr.clone();
            }
            Dir2RpmError::ArtifactNotFound { probed, candidates, .. } => {
                failure.probed = probed.clone();
                failure.candidates = candidates.clone();
            }
            _ => {}
        }
        failure
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildResult {
    Success { artifact_path: PathBuf },
    Failure(Failure),
}

impl BuildResult {
    pub fn failed(stage: Stage, err: &Dir2RpmError) -> Self {
        BuildResult::Failure(Failure::from_error(stage, err))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildResult::Success { .. })
    }

    pub fn artifact_path(&self) -> Option<&PathBuf> {
        match self {
            BuildResult::Success { artifact_path } => Some(artifact_path),
            BuildResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            BuildResult::Failure(f) => Some(f),
            BuildResult::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_carries_exit_code_and_stderr() {
        let err = Dir2RpmError::ToolExecutionFailed {
            exit_code: Some(2),
            stderr: "missing rpmbuild".into(),
            reason: "build tool exited with status 2".into(),
        };
        let result = BuildResult::failed(Stage::Invocation, &err);
        let failure = result.failure().unwrap();
        assert_eq!(failure.kind, ErrorKind::ToolExecutionFailed);
        assert_eq!(failure.exit_code, Some(2));
        assert_eq!(failure.stderr, "missing rpmbuild");
        assert!(result.artifact_path().is_none());
    }

    #[test]
    fn serializes_with_status_tag() {
        let ok = BuildResult::Success { artifact_path: PathBuf::from("/tmp/a.rpm") };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["artifact_path"], "/tmp/a.rpm");

        let err = Dir2RpmError::invalid_input("no such directory");
        let json = serde_json::to_value(BuildResult::failed(Stage::Validation, &err)).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "invalid_input");
        assert_eq!(json["stage"], "validation");
    }
}
