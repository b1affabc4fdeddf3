//! src/package/descriptor.rs
//! Renders the build descriptor (an RPM `.spec`) handed to the external build tool.
//!
//! Layout, in order: header fields, `%description`, empty `%prep`/`%build`/`%install`
//! phases, an empty `%files` manifest for the tool to fill, one section per present
//! lifecycle script, then `%changelog`. Field values are substituted verbatim.

use std::fmt::Write as _;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::{Dir2RpmError, Result};
use crate::package::meta::PackageMetadata;
use crate::package::scripts::LifecycleScripts;

pub const CHANGELOG_AUTHOR: &str = "dir2rpm <dir2rpm@localhost>";
pub const CHANGELOG_NOTE: &str = "- Automatically generated by dir2rpm";

const BUILD_PHASES: [&str; 3] = ["%prep", "%build", "%install"];

pub fn render(meta: &PackageMetadata, scripts: &LifecycleScripts, today: NaiveDate) -> Result<String> {
    if let Some(field) = meta.missing_required() {
        return Err(Dir2RpmError::InvalidMetadata { field });
    }

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Name: {}", meta.name);
    let _ = writeln!(out, "Version: {}", meta.version);
    let _ = writeln!(out, "Release: {}", meta.release);
    let _ = writeln!(out, "Summary: {}", meta.summary);
    let _ = writeln!(out, "License: {}", meta.license);
    let _ = writeln!(out, "Vendor: {}", meta.vendor);
    let _ = writeln!(out, "BuildArch: {}", meta.architecture);
    if !meta.dependencies.is_empty() {
        let _ = writeln!(out, "Requires: {}", meta.dependencies.join(", "));
    }

    out.push_str("\n%description\n");
    out.push_str(meta.description.trim_end());
    out.push('\n');

    for phase in BUILD_PHASES {
        let _ = write!(out, "\n{}\n", phase);
    }
    out.push_str("\n%files\n");

    for (kind, script) in scripts.iter() {
        let _ = write!(out, "\n{}\n{}\n", kind.section(), script.body.trim_end());
    }

    let _ = write!(
        out,
        "\n%changelog\n* {} {} - {}-{}\n{}\n",
        today.format("%a %b %d %Y"),
        CHANGELOG_AUTHOR,
        meta.version,
        meta.release,
        CHANGELOG_NOTE
    );

    debug!(name = %meta.name, scripts = scripts.len(), bytes = out.len(), "rendered descriptor");
    Ok(out)
}

/// File name the descriptor is staged under.
pub fn descriptor_file_name(meta: &PackageMetadata) -> String {
    format!("{}.spec", meta.name)
}
