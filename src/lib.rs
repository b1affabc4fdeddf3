//! dir2rpm: turn a directory plus package metadata into an installable RPM.
//!
//! The library drives an external build tool (`dir2rpm.sh` by default) and
//! takes care of everything around it: metadata defaulting, descriptor
//! rendering, staging and cleanup of the files the tool reads, capturing the
//! tool's output, and finding the artifact it produced.
//!
//! ```no_run
//! use dir2rpm::{AppConfig, BuildRequest, Pipeline, SystemClock};
//!
//! let cfg = AppConfig::load();
//! let request = BuildRequest {
//!     source_dir: "/tmp/app".into(),
//!     tool_path: cfg.tool_path.clone(),
//!     ..Default::default()
//! };
//! let outcome = Pipeline::new(&cfg, &SystemClock).run(&request);
//! println!("{:?}", outcome.result);
//! ```

pub mod checksum;
pub mod config;
pub mod error;
pub mod invoke;
pub mod logging;
pub mod outcome;
pub mod package;
pub mod pipeline;
pub mod resolve;
pub mod workspace;

pub use config::AppConfig;
pub use error::{Dir2RpmError, ErrorKind, Result};
pub use outcome::{BuildResult, Failure, Stage};
pub use package::{
    validate_and_default, Architecture, Clock, FixedClock, LifecycleScripts, PackageMetadata, RawMetadata, ScriptKind,
    SystemClock,
};
pub use pipeline::{BuildOutcome, BuildRequest, Pipeline};
pub use resolve::{CollisionPolicy, ResolveOptions};
pub use workspace::{StagingLayout, Workspace};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
