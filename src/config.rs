// src/config.rs
// Loads dir2rpm configuration from /etc, the user config dir and the environment; provides defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{Dir2RpmError, Result};
use crate::resolve::{CollisionPolicy, ResolveOptions};
use crate::workspace::StagingLayout;

pub const DEFAULT_TOOL: &str = "/usr/bin/dir2rpm.sh";
const SYSTEM_CONFIG: &str = "/etc/dir2rpm/config.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub tool_path: PathBuf,
    /// `None` waits for the tool indefinitely.
    pub timeout: Option<Duration>,
    /// Where the build tool drops its output by convention (`~/rpmbuild/RPMS`).
    pub build_root: PathBuf,
    /// Canonical output location; `None` means the source directory itself.
    pub output_dir: Option<PathBuf>,
    pub artifact_extension: String,
    pub on_collision: CollisionPolicy,
    pub layout: StagingLayout,
    pub write_descriptor: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            tool_path: PathBuf::from(DEFAULT_TOOL),
            timeout: None,
            build_root: PathBuf::from("~/rpmbuild/RPMS").expand_home(),
            output_dir: None,
            artifact_extension: "rpm".to_string(),
            on_collision: CollisionPolicy::Overwrite,
            layout: StagingLayout::Standard,
            write_descriptor: true,
        }
    }
}

// On-disk shape. Every key is optional so files only override what they name.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    tool: ToolSection,
    paths: PathsSection,
    artifact: ArtifactSection,
    staging: StagingSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ToolSection {
    path: Option<PathBuf>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PathsSection {
    build_root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ArtifactSection {
    extension: Option<String>,
    on_collision: Option<CollisionPolicy>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StagingSection {
    layout: Option<StagingLayout>,
    write_descriptor: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Self {
        let mut cfg = AppConfig::default();

        // 1) System config
        let sys_cfg = Path::new(SYSTEM_CONFIG);
        if sys_cfg.exists() {
            if let Err(e) = cfg.apply_file(sys_cfg) {
                warn!("failed to load {}: {}", sys_cfg.display(), e);
            }
        }

        // 2) User config: $XDG_CONFIG_HOME/dir2rpm/config.toml or ~/.config/dir2rpm/config.toml
        let user_cfg_path = Self::user_config_path();
        if user_cfg_path.exists() {
            if let Err(e) = cfg.apply_file(&user_cfg_path) {
                warn!("failed to load {}: {}", user_cfg_path.display(), e);
            }
        }

        // 3) Environment overrides
        cfg.apply_env(|key| env::var(key).ok());
        debug!(?cfg, "configuration loaded");
        cfg
    }

    pub fn user_config_path() -> PathBuf {
        env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("~/.config").expand_home())
            .join("dir2rpm/config.toml")
    }

    pub fn apply_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .map_err(|e| Dir2RpmError::io(format!("could not read config '{}'", path.display()), e))?;
        self.apply_toml(&content).map_err(|e| match e {
            Dir2RpmError::InvalidInput { reason, source } => Dir2RpmError::InvalidInput {
                reason: format!("{}: {}", path.display(), reason),
                source,
            },
            other => other,
        })
    }

    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let file: ConfigFile =
            toml::from_str(content).map_err(|e| Dir2RpmError::invalid_input(format!("malformed config: {}", e)))?;

        if let Some(v) = file.tool.path { self.tool_path = v.expand_home(); }
        if let Some(v) = file.tool.timeout_secs { self.timeout = timeout_from_secs(v); }
        if let Some(v) = file.paths.build_root { self.build_root = v.expand_home(); }
        if let Some(v) = file.paths.output_dir { self.output_dir = Some(v.expand_home()); }
        if let Some(v) = file.artifact.extension { self.artifact_extension = v; }
        if let Some(v) = file.artifact.on_collision { self.on_collision = v; }
        if let Some(v) = file.staging.layout { self.layout = v; }
        if let Some(v) = file.staging.write_descriptor { self.write_descriptor = v; }
        Ok(())
    }

    /// `lookup` maps a variable name to its value; `std::env::var` in production.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("DIR2RPM_TOOL") { self.tool_path = PathBuf::from(v).expand_home(); }
        if let Some(v) = lookup("DIR2RPM_BUILD_ROOT") { self.build_root = PathBuf::from(v).expand_home(); }
        if let Some(v) = lookup("DIR2RPM_OUTPUT_DIR") { self.output_dir = Some(PathBuf::from(v).expand_home()); }
        if let Some(v) = lookup("DIR2RPM_EXTENSION") { self.artifact_extension = v; }
        if let Some(v) = lookup("DIR2RPM_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) => self.timeout = timeout_from_secs(secs),
                Err(_) => warn!("ignoring DIR2RPM_TIMEOUT_SECS={:?}: not a number of seconds", v),
            }
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions { extension: self.artifact_extension.clone(), on_collision: self.on_collision }
    }
}

// 0 disables the timeout
fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Replaces a leading `~` component with the user's home directory.
pub trait ExpandHome {
    fn expand_home(self) -> PathBuf;
}

impl ExpandHome for PathBuf {
    fn expand_home(self) -> PathBuf {
        let Some(home) = dirs_next::home_dir() else { return self };
        if let Ok(rest) = self.strip_prefix("~") {
            return home.join(rest);
        }
        self
    }
}
