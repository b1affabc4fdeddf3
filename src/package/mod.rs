// src/package/mod.rs
// Everything that describes the package: metadata, lifecycle scripts and the
// two text forms handed to the build tool (descriptor and sidecar).

pub mod descriptor;
pub mod meta;
pub mod scripts;
pub mod sidecar;

pub use meta::{validate_and_default, Architecture, Clock, FixedClock, PackageMetadata, RawMetadata, SystemClock};
pub use scripts::{LifecycleScript, LifecycleScripts, ScriptKind};
