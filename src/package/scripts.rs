//! src/package/scripts.rs
//! Install/uninstall hooks supplied alongside the package metadata.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Dir2RpmError, Result};

/// Script kinds, declared in the order they appear in a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptKind {
    PreInstall,
    PostInstall,
    PreUninstall,
    PostUninstall,
}

impl ScriptKind {
    pub const ALL: [ScriptKind; 4] = [
        ScriptKind::PreInstall,
        ScriptKind::PostInstall,
        ScriptKind::PreUninstall,
        ScriptKind::PostUninstall,
    ];

    /// File name used by the standard staging layout.
    pub fn file_name(&self) -> &'static str {
        match self {
            ScriptKind::PreInstall => "pre-install",
            ScriptKind::PostInstall => "post-install",
            ScriptKind::PreUninstall => "pre-uninstall",
            ScriptKind::PostUninstall => "post-uninstall",
        }
    }

    /// File name used by the legacy staging layout.
    pub fn legacy_file_name(&self) -> &'static str {
        match self {
            ScriptKind::PreInstall => "preinst",
            ScriptKind::PostInstall => "postinst",
            ScriptKind::PreUninstall => "preun",
            ScriptKind::PostUninstall => "postun",
        }
    }

    /// Descriptor section marker.
    pub fn section(&self) -> &'static str {
        match self {
            ScriptKind::PreInstall => "%pre",
            ScriptKind::PostInstall => "%post",
            ScriptKind::PreUninstall => "%preun",
            ScriptKind::PostUninstall => "%postun",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleScript {
    pub body: String,
    /// Unix permission bits of the file the script was read from.
    pub mode: Option<u32>,
}

/// Mapping from script kind to body. Blank bodies are treated as absent.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleScripts {
    entries: BTreeMap<ScriptKind, LifecycleScript>,
}

impl LifecycleScripts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the body for `kind`; a blank body removes it.
    pub fn set(&mut self, kind: ScriptKind, body: impl Into<String>) -> &mut Self {
        let body = body.into();
        if body.trim().is_empty() {
            self.entries.remove(&kind);
        } else {
            self.entries.insert(kind, LifecycleScript { body, mode: None });
        }
        self
    }

    pub fn with(mut self, kind: ScriptKind, body: impl Into<String>) -> Self {
        self.set(kind, body);
        self
    }

    /// Reads the body of `kind` from a file, remembering its permission bits.
    pub fn load(&mut self, kind: ScriptKind, path: &Path) -> Result<&mut Self> {
        let body = fs::read_to_string(path)
            .map_err(|e| Dir2RpmError::io(format!("could not read {} script '{}'", kind.file_name(), path.display()), e))?;
        if body.trim().is_empty() {
            self.entries.remove(&kind);
            return Ok(self);
        }
        let mode = file_mode(path);
        self.entries.insert(kind, LifecycleScript { body, mode });
        Ok(self)
    }

    pub fn get(&self, kind: ScriptKind) -> Option<&LifecycleScript> {
        self.entries.get(&kind)
    }

    /// Present scripts in descriptor order.
    pub fn iter(&self) -> impl Iterator<Item = (ScriptKind, &LifecycleScript)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn file_mode(path: &Path) -> Option<u32> {
            use std::os::unix::fs::PermissionsExt;
            fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o7777)
        }
    } else {
        fn file_mode(_path: &Path) -> Option<u32> {
            None
        }
    }
}
