//! src/package/meta.rs
//! Package metadata: raw caller-supplied fields, validation and defaulting.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Dir2RpmError, Result};

pub const DEFAULT_RELEASE: &str = "1";
pub const DEFAULT_SUMMARY: &str = "Packaged directory contents";
pub const DEFAULT_LICENSE: &str = "MIT";
pub const DEFAULT_VENDOR: &str = "unknown";
const FALLBACK_NAME: &str = "package";

/// Source of "today" for date-derived defaults.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock frozen on one day, for tests and reproducible builds.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    #[serde(rename = "noarch")]
    Noarch,
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "i386")]
    I386,
    #[serde(rename = "arm")]
    Arm,
}

impl Architecture {
    pub const ALL: [Architecture; 4] = [
        Architecture::Noarch,
        Architecture::X86_64,
        Architecture::I386,
        Architecture::Arm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Architecture::Noarch => "noarch",
            Architecture::X86_64 => "x86_64",
            Architecture::I386 => "i386",
            Architecture::Arm => "arm",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Architecture {
    type Err = Dir2RpmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "noarch" => Ok(Architecture::Noarch),
            "x86_64" | "amd64" => Ok(Architecture::X86_64),
            "i386" | "i686" | "x86" => Ok(Architecture::I386),
            "arm" | "armv7hl" | "armhfp" => Ok(Architecture::Arm),
            other => Err(Dir2RpmError::invalid_input(format!(
                "unsupported architecture '{}' (expected one of: noarch, x86_64, i386, arm)",
                other
            ))),
        }
    }
}

/// Field values as an external form or CLI hands them over: free text, possibly blank.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RawMetadata {
    pub name: String,
    pub version: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub license: String,
    pub architecture: String,
    pub vendor: String,
    /// Comma-separated dependency specifiers.
    pub dependencies: String,
}

/// Validated, fully defaulted package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
    pub release: String,
    pub summary: String,
    pub description: String,
    pub license: String,
    pub architecture: Architecture,
    pub vendor: String,
    pub dependencies: Vec<String>,
}

impl PackageMetadata {
    /// `{name}-{version}-{release}.{architecture}.{extension}`
    pub fn artifact_name(&self, extension: &str) -> String {
        format!(
            "{}-{}-{}.{}.{}",
            self.name,
            self.version,
            self.release,
            self.architecture,
            extension.trim_start_matches('.')
        )
    }

    /// Returns the first required field that is empty, if any.
    pub fn missing_required(&self) -> Option<&'static str> {
        if self.name.trim().is_empty() {
            Some("name")
        } else if self.version.trim().is_empty() {
            Some("version")
        } else if self.release.trim().is_empty() {
            Some("release")
        } else {
            None
        }
    }
}

/// Checks the source directory and turns raw fields into `PackageMetadata`,
/// filling every blank field with its default.
pub fn validate_and_default(raw: &RawMetadata, source_dir: &Path, clock: &dyn Clock) -> Result<PackageMetadata> {
    if !source_dir.is_dir() {
        return Err(Dir2RpmError::invalid_input(format!(
            "source directory '{}' does not exist or is not a directory",
            source_dir.display()
        )));
    }

    let name = match single_line("name", &raw.name)? {
        Some(n) => n,
        None => sanitize_name(&directory_basename(source_dir)),
    };
    let version = single_line("version", &raw.version)?
        .unwrap_or_else(|| clock.today().format("%Y%m%d").to_string());
    let release = single_line("release", &raw.release)?.unwrap_or_else(|| DEFAULT_RELEASE.to_string());
    let summary = single_line("summary", &raw.summary)?.unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let license = single_line("license", &raw.license)?.unwrap_or_else(|| DEFAULT_LICENSE.to_string());
    let vendor = single_line("vendor", &raw.vendor)?.unwrap_or_else(|| DEFAULT_VENDOR.to_string());
    let architecture = match single_line("architecture", &raw.architecture)? {
        Some(a) => a.parse()?,
        None => Architecture::default(),
    };

    let description = if raw.description.trim().is_empty() {
        summary.clone()
    } else {
        raw.description.trim_end().to_string()
    };

    Ok(PackageMetadata {
        name,
        version,
        release,
        summary,
        description,
        license,
        architecture,
        vendor,
        dependencies: split_dependencies(&raw.dependencies),
    })
}

/// Splits a comma-separated list, trimming entries and dropping empty ones.
pub fn split_dependencies(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Reduces arbitrary text to a usable package name.
pub fn sanitize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-') { c } else { '-' };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.');
    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

fn directory_basename(dir: &Path) -> String {
    if let Some(name) = dir.file_name() {
        return name.to_string_lossy().into_owned();
    }
    // "." or ".." have no file name of their own
    dir.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_default()
}

/// Trimmed value, `None` when blank. Header fields must not span lines.
fn single_line(field: &str, value: &str) -> Result<Option<String>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.contains('\n') || value.contains('\r') {
        return Err(Dir2RpmError::invalid_input(format!("field '{}' must be a single line", field)));
    }
    Ok(Some(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
    }

    #[test]
    fn blank_fields_take_defaults() {
        let dir = tempfile::Builder::new().prefix("My App").tempdir().unwrap();
        let meta = validate_and_default(&RawMetadata::default(), dir.path(), &clock()).unwrap();

        assert!(meta.name.starts_with("My-App"), "got {}", meta.name);
        assert_eq!(meta.version, "20240307");
        assert_eq!(meta.release, "1");
        assert_eq!(meta.summary, DEFAULT_SUMMARY);
        assert_eq!(meta.description, DEFAULT_SUMMARY);
        assert_eq!(meta.license, "MIT");
        assert_eq!(meta.architecture, Architecture::Noarch);
        assert_eq!(meta.vendor, "unknown");
        assert!(meta.dependencies.is_empty());
        assert_eq!(meta.missing_required(), None);
    }

    #[test]
    fn supplied_fields_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawMetadata {
            name: " demo ".into(),
            version: "2.3".into(),
            release: "4".into(),
            summary: "Demo".into(),
            description: "Line one\nLine two\n\n".into(),
            architecture: "AMD64".into(),
            dependencies: " bash, ,coreutils >= 8 ,".into(),
            ..Default::default()
        };
        let meta = validate_and_default(&raw, dir.path(), &clock()).unwrap();

        assert_eq!(meta.name, "demo");
        assert_eq!(meta.description, "Line one\nLine two");
        assert_eq!(meta.architecture, Architecture::X86_64);
        assert_eq!(meta.dependencies, vec!["bash", "coreutils >= 8"]);
        assert_eq!(meta.artifact_name("rpm"), "demo-2.3-4.x86_64.rpm");
    }

    #[test]
    fn missing_directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        let err = validate_and_default(&RawMetadata::default(), &gone, &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn unknown_architecture_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawMetadata { architecture: "sparc".into(), ..Default::default() };
        let err = validate_and_default(&raw, dir.path(), &clock()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.to_string().contains("sparc"));
    }

    #[test]
    fn multi_line_header_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawMetadata { summary: "one\ntwo".into(), ..Default::default() };
        assert!(validate_and_default(&raw, dir.path(), &clock()).is_err());
    }

    #[test]
    fn sanitize_name_cases() {
        assert_eq!(sanitize_name("my app (v2)"), "my-app-v2");
        assert_eq!(sanitize_name("..hidden"), "hidden");
        assert_eq!(sanitize_name("лиса"), "package");
        assert_eq!(sanitize_name("lib_foo+bar-1.0"), "lib_foo+bar-1.0");
    }

    #[test]
    fn architecture_display_round_trips() {
        for arch in Architecture::ALL {
            assert_eq!(arch.as_str().parse::<Architecture>().unwrap(), arch);
        }
    }
}
