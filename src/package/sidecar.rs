//! src/package/sidecar.rs
//! Plain `Key: value` metadata file read by the external build tool.
//!
//! Fields still at their placeholder default are left out. A multi-line
//! description continues on lines starting with a single space, with ` .`
//! standing for an empty line.

use crate::package::meta::{
    Architecture, PackageMetadata, RawMetadata, DEFAULT_LICENSE, DEFAULT_RELEASE, DEFAULT_SUMMARY, DEFAULT_VENDOR,
};

pub fn render_sidecar(meta: &PackageMetadata) -> String {
    let mut out = String::new();
    push_field(&mut out, "Name", &meta.name);
    push_field(&mut out, "Version", &meta.version);
    if meta.release != DEFAULT_RELEASE {
        push_field(&mut out, "Release", &meta.release);
    }
    if meta.summary != DEFAULT_SUMMARY {
        push_field(&mut out, "Summary", &meta.summary);
    }
    if meta.description != meta.summary {
        let mut lines = meta.description.lines();
        push_field(&mut out, "Description", lines.next().unwrap_or(""));
        for line in lines {
            if line.trim().is_empty() {
                out.push_str(" .\n");
            } else {
                out.push(' ');
                out.push_str(line);
                out.push('\n');
            }
        }
    }
    if meta.license != DEFAULT_LICENSE {
        push_field(&mut out, "License", &meta.license);
    }
    if meta.architecture != Architecture::default() {
        push_field(&mut out, "Arch", meta.architecture.as_str());
    }
    if meta.vendor != DEFAULT_VENDOR {
        push_field(&mut out, "Vendor", &meta.vendor);
    }
    if !meta.dependencies.is_empty() {
        push_field(&mut out, "Depends", &meta.dependencies.join(", "));
    }
    out
}

/// Reads a sidecar back into raw fields. Unknown keys and comment lines are ignored;
/// omitted fields stay blank and pick up their defaults on validation.
pub fn parse_sidecar(content: &str) -> RawMetadata {
    let mut raw = RawMetadata::default();
    let mut in_description = false;

    for line in content.lines() {
        if in_description {
            if let Some(rest) = line.strip_prefix(' ') {
                raw.description.push('\n');
                if rest != "." {
                    raw.description.push_str(rest);
                }
                continue;
            }
            in_description = false;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let Some((key, value)) = trimmed.split_once(':') else { continue };
        let value = value.trim().to_string();
        match key.trim().to_ascii_lowercase().as_str() {
            "name" => raw.name = value,
            "version" => raw.version = value,
            "release" => raw.release = value,
            "summary" => raw.summary = value,
            "description" => {
                raw.description = value;
                in_description = true;
            }
            "license" => raw.license = value,
            "arch" | "architecture" | "buildarch" => raw.architecture = value,
            "vendor" => raw.vendor = value,
            "depends" | "requires" => raw.dependencies = value,
            _ => {}
        }
    }
    raw
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(value);
    out.push('\n');
}
