//! src/error.rs
//! Error types shared by every stage of the build pipeline.

use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Dir2RpmError>;

/// Coarse classification of a failure, reported to callers in `BuildResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidMetadata,
    ToolNotFound,
    ToolExecutionFailed,
    ArtifactNotFound,
    ArtifactCollision,
    RelocationFailed,
    CleanupFailed,
}

#[derive(Error, Debug)]
pub enum Dir2RpmError {
    #[error("invalid input: {reason}")]
    InvalidInput {
        reason: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("invalid metadata: required field '{field}' is empty")]
    InvalidMetadata { field: &'static str },

    #[error("build tool not found or not executable: {}", .path.display())]
    ToolNotFound { path: PathBuf },

    #[error("build tool failed ({status}): {reason}", status = describe_exit(.exit_code))]
    ToolExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
        reason: String,
    },

    #[error("artifact {expected} not found (probed: {}){}", join_paths(.probed), describe_candidates(.candidates))]
    ArtifactNotFound {
        expected: String,
        probed: Vec<PathBuf>,
        candidates: Vec<PathBuf>,
    },

    #[error("artifact already exists at {}", .path.display())]
    ArtifactCollision { path: PathBuf },

    #[error("could not move artifact from {} to {}: {source}", .from.display(), .to.display())]
    RelocationFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cleanup failed for {}: {reason}", join_paths(.paths))]
    CleanupFailed { paths: Vec<PathBuf>, reason: String },
}

impl Dir2RpmError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Dir2RpmError::InvalidInput { reason: reason.into(), source: None }
    }

    pub fn io(reason: impl Into<String>, source: io::Error) -> Self {
        Dir2RpmError::InvalidInput { reason: reason.into(), source: Some(source) }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Dir2RpmError::InvalidInput { .. } => ErrorKind::InvalidInput,
            Dir2RpmError::InvalidMetadata { .. } => ErrorKind::InvalidMetadata,
            Dir2RpmError::ToolNotFound { .. } => ErrorKind::ToolNotFound,
            Dir2RpmError::ToolExecutionFailed { .. } => ErrorKind::ToolExecutionFailed,
            Dir2RpmError::ArtifactNotFound { .. } => ErrorKind::ArtifactNotFound,
            Dir2RpmError::ArtifactCollision { .. } => ErrorKind::ArtifactCollision,
            Dir2RpmError::RelocationFailed { .. } => ErrorKind::RelocationFailed,
            Dir2RpmError::CleanupFailed { .. } => ErrorKind::CleanupFailed,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "no exit code".to_string(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

fn describe_candidates(candidates: &[PathBuf]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!("; other packages found: {}", join_paths(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_message_names_exit_code() {
        let err = Dir2RpmError::ToolExecutionFailed {
            exit_code: Some(2),
            stderr: "boom".into(),
            reason: "non-zero exit".into(),
        };
        assert_eq!(err.to_string(), "build tool failed (exit code 2): non-zero exit");
        assert_eq!(err.kind(), ErrorKind::ToolExecutionFailed);
    }

    #[test]
    fn not_found_message_lists_probes_and_candidates() {
        let err = Dir2RpmError::ArtifactNotFound {
            expected: "a-1-1.noarch.rpm".into(),
            probed: vec![PathBuf::from("/x/a-1-1.noarch.rpm"), PathBuf::from("/y/a-1-1.noarch.rpm")],
            candidates: vec![PathBuf::from("/x/b.rpm")],
        };
        let msg = err.to_string();
        assert!(msg.contains("/x/a-1-1.noarch.rpm, /y/a-1-1.noarch.rpm"));
        assert!(msg.ends_with("other packages found: /x/b.rpm"));
    }
}
