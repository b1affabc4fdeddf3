//! End-to-end runs of the build pipeline against small shell scripts
//! standing in for the real build tool.

#![cfg(unix)]

use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use dir2rpm::{
    AppConfig, BuildRequest, BuildResult, ErrorKind, FixedClock, LifecycleScripts, Pipeline, RawMetadata, ScriptKind,
    Stage, StagingLayout,
};
use tempfile::TempDir;

struct Fixture {
    source: TempDir,
    build_root: TempDir,
    bin: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let source = tempfile::Builder::new().prefix("app").tempdir().unwrap();
        fs::write(source.path().join("README"), "payload").unwrap();
        Fixture { source, build_root: tempfile::tempdir().unwrap(), bin: tempfile::tempdir().unwrap() }
    }

    fn config(&self) -> AppConfig {
        AppConfig { build_root: self.build_root.path().to_path_buf(), ..Default::default() }
    }

    /// Writes an executable `/bin/sh` script; `@ROOT@` expands to the build root.
    fn tool(&self, body: &str) -> PathBuf {
        let path = self.bin.path().join("dir2rpm.sh");
        let body = body.replace("@ROOT@", &self.build_root.path().display().to_string());
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn request(&self, tool: PathBuf, scripts: LifecycleScripts) -> BuildRequest {
        BuildRequest { source_dir: self.source.path().to_path_buf(), fields: demo_fields(), scripts, tool_path: tool }
    }

    /// Source directory as the pipeline reports it: symlink-free and absolute.
    fn src(&self) -> PathBuf {
        self.source.path().canonicalize().unwrap()
    }

    fn source_listing(&self) -> BTreeSet<String> {
        listing(self.source.path())
    }
}

fn demo_fields() -> RawMetadata {
    RawMetadata {
        name: "demo".into(),
        version: "2.3".into(),
        release: "4".into(),
        architecture: "x86_64".into(),
        ..Default::default()
    }
}

fn clock() -> FixedClock {
    FixedClock(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap())
}

fn listing(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir).unwrap().map(|e| e.unwrap().file_name().to_string_lossy().into_owned()).collect()
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn artifact_in_build_root_is_moved_next_to_sources() {
    let fx = Fixture::new();
    let tool = fx.tool(
        r#"test -f "$1/metadata" || exit 3
mkdir -p "@ROOT@/x86_64"
cp "$1/metadata" "@ROOT@/x86_64/demo-2.3-4.x86_64.rpm"
echo "RPM created: @ROOT@/x86_64/demo-2.3-4.x86_64.rpm""#,
    );
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    let expected = fx.src().join("demo-2.3-4.x86_64.rpm");
    assert_eq!(outcome.result, BuildResult::Success { artifact_path: expected.clone() });
    assert!(!fx.build_root.path().join("x86_64/demo-2.3-4.x86_64.rpm").exists());
    assert_eq!(fs::read_to_string(&expected).unwrap(), "Name: demo\nVersion: 2.3\nRelease: 4\nArch: x86_64\n");
    assert!(outcome.stdout.starts_with("RPM created: "));
    assert_eq!(outcome.artifact_sha256.as_deref().map(str::len), Some(64));
    assert!(outcome.warnings.is_empty());
    // staged sidecar and descriptor are gone, only the payload and the RPM remain
    assert_eq!(fx.source_listing(), names(&["README", "demo-2.3-4.x86_64.rpm"]));
    assert_eq!(outcome.staged_files.len(), 2);
}

#[test]
fn tool_failure_is_reported_without_resolution() {
    let fx = Fixture::new();
    let stale = fx.build_root.path().join("x86_64/demo-2.3-4.x86_64.rpm");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, "old build").unwrap();
    let tool = fx.tool("echo 'starting'\nprintf 'missing rpmbuild' >&2\nexit 2");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    let failure = outcome.result.failure().expect("tool failure must fail the run");
    assert_eq!(failure.stage, Stage::Invocation);
    assert_eq!(failure.kind, ErrorKind::ToolExecutionFailed);
    assert_eq!(failure.exit_code, Some(2));
    assert_eq!(failure.stderr, "missing rpmbuild");
    assert!(failure.probed.is_empty());
    assert_eq!(outcome.stdout, "starting\n");
    assert_eq!(outcome.stderr, "missing rpmbuild");
    assert!(stale.exists(), "no resolution may run after a tool failure");
    assert_eq!(fx.source_listing(), names(&["README"]));
}

#[test]
fn missing_artifact_lists_both_exact_locations() {
    let fx = Fixture::new();
    let tool = fx.tool("echo done");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    let failure = outcome.result.failure().unwrap();
    assert_eq!(failure.stage, Stage::Resolution);
    assert_eq!(failure.kind, ErrorKind::ArtifactNotFound);
    assert!(failure.candidates.is_empty());
    assert!(failure.probed.contains(&fx.build_root.path().join("x86_64/demo-2.3-4.x86_64.rpm")));
    assert!(failure.probed.contains(&fx.src().join("demo-2.3-4.x86_64.rpm")));
    assert_eq!(fx.source_listing(), names(&["README"]));
}

#[test]
fn differently_named_output_is_a_diagnostic_failure() {
    let fx = Fixture::new();
    let tool = fx.tool("mkdir -p \"@ROOT@/x86_64\"\ntouch \"@ROOT@/x86_64/demo-2.3-4.el9.x86_64.rpm\"");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    let failure = outcome.result.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::ArtifactNotFound);
    assert_eq!(failure.candidates, vec![fx.build_root.path().join("x86_64/demo-2.3-4.el9.x86_64.rpm")]);
    assert!(failure.diagnostic.contains("demo-2.3-4.el9.x86_64.rpm"));
}

#[test]
fn lifecycle_scripts_and_descriptor_reach_the_tool() {
    let fx = Fixture::new();
    let tool = fx.tool(
        r#"cat "$1/post-install"
grep -c '^%post$' "$1/demo.spec"
test -e "$1/pre-install" && echo "unexpected pre-install"
touch "$PWD/demo-2.3-4.x86_64.rpm""#,
    );
    let scripts = LifecycleScripts::new()
        .with(ScriptKind::PostInstall, "echo configured\n")
        .with(ScriptKind::PreInstall, "");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, scripts));

    assert!(outcome.result.is_success(), "{:?}", outcome.result);
    assert_eq!(outcome.stdout, "echo configured\n1\n");
    assert_eq!(fx.source_listing(), names(&["README", "demo-2.3-4.x86_64.rpm"]));
}

#[test]
fn legacy_layout_and_output_dir() {
    let fx = Fixture::new();
    let out = tempfile::tempdir().unwrap();
    let out_dir = out.path().join("rpms");
    let tool = fx.tool(
        r#"test -f "$1/metadata.txt" || exit 4
test -f "$1/postun" || exit 5
touch "$PWD/demo-2.3-4.x86_64.rpm""#,
    );
    let cfg = AppConfig {
        layout: StagingLayout::Legacy,
        output_dir: Some(out_dir.clone()),
        write_descriptor: false,
        ..fx.config()
    };
    let clock = clock();
    let scripts = LifecycleScripts::new().with(ScriptKind::PostUninstall, "ldconfig");

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, scripts));

    assert_eq!(outcome.result.artifact_path(), Some(&out_dir.join("demo-2.3-4.x86_64.rpm")));
    assert_eq!(fx.source_listing(), names(&["README"]));
}

#[test]
fn timeout_still_cleans_up() {
    let fx = Fixture::new();
    let tool = fx.tool("echo 'building demo'\nprintf 'rpmbuild: stuck waiting on lock' >&2\nexec sleep 10");
    let cfg = AppConfig { timeout: Some(Duration::from_millis(500)), ..fx.config() };
    let clock = clock();
    let scripts = LifecycleScripts::new().with(ScriptKind::PreUninstall, "true");

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, scripts));

    let failure = outcome.result.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::ToolExecutionFailed);
    assert_eq!(failure.exit_code, None);
    assert!(failure.diagnostic.contains("timed out"));
    // output written before the kill is kept
    assert_eq!(failure.stderr, "rpmbuild: stuck waiting on lock");
    assert_eq!(outcome.stderr, "rpmbuild: stuck waiting on lock");
    assert_eq!(outcome.stdout, "building demo\n");
    assert_eq!(fx.source_listing(), names(&["README"]));
}

#[tokio::test]
async fn runs_inside_an_async_runtime() {
    let fx = Fixture::new();
    let tool = fx.tool("touch \"$(pwd)/demo-2.3-4.x86_64.rpm\"");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    assert_eq!(outcome.result.artifact_path(), Some(&fx.src().join("demo-2.3-4.x86_64.rpm")));
}

#[test]
fn blank_name_defaults_to_directory_name() {
    let fx = Fixture::new();
    let tool = fx.tool("touch \"$PWD/placeholder\"");
    let cfg = fx.config();
    let clock = clock();
    let mut request = fx.request(tool, LifecycleScripts::new());
    request.fields = RawMetadata::default();

    let outcome = Pipeline::new(&cfg, &clock).run(&request);

    let meta = outcome.metadata.expect("metadata is reported even when resolution fails");
    assert!(meta.name.starts_with("app"));
    assert_eq!(meta.version, "20240307");
    let failure = outcome.result.failure().unwrap();
    assert!(failure.probed[0].ends_with(format!("noarch/{}-20240307-1.noarch.rpm", meta.name)));
}

#[test]
fn pre_existing_sidecar_blocks_staging() {
    let fx = Fixture::new();
    fs::write(fx.source.path().join("metadata"), "mine").unwrap();
    let tool = fx.tool("exit 0");
    let cfg = fx.config();
    let clock = clock();

    let outcome = Pipeline::new(&cfg, &clock).run(&fx.request(tool, LifecycleScripts::new()));

    let failure = outcome.result.failure().unwrap();
    assert_eq!(failure.stage, Stage::Staging);
    assert_eq!(failure.kind, ErrorKind::InvalidInput);
    assert_eq!(fs::read_to_string(fx.source.path().join("metadata")).unwrap(), "mine");
    assert_eq!(fx.source_listing(), names(&["README", "metadata"]));
}
