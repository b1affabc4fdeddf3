use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use dir2rpm::package::descriptor;
use dir2rpm::package::sidecar::{parse_sidecar, render_sidecar};
use dir2rpm::{
    logging, validate_and_default, AppConfig, BuildOutcome, BuildRequest, BuildResult, Clock, Dir2RpmError,
    LifecycleScripts, Pipeline, RawMetadata, ScriptKind, StagingLayout, SystemClock, VERSION,
};

#[derive(Parser)]
#[command(name = "dir2rpm")]
#[command(about = "Create installable RPM packages from a directory")]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds an RPM from a directory
    Build {
        #[command(flatten)]
        meta: MetadataArgs,

        /// Build tool to run (defaults to config, then /usr/bin/dir2rpm.sh)
        #[arg(long = "tool")]
        tool: Option<PathBuf>,
        /// Where the finished RPM goes (defaults to the source directory)
        #[arg(short = 'o', long = "output-dir")]
        output_dir: Option<PathBuf>,
        /// Build root the tool writes into (defaults to ~/rpmbuild/RPMS)
        #[arg(long = "build-root")]
        build_root: Option<PathBuf>,
        /// Kill the build tool after this many seconds (0 = never)
        #[arg(long = "timeout", value_name = "SECS")]
        timeout: Option<u64>,
        /// Stage metadata.txt/preinst/... instead of metadata/pre-install/...
        #[arg(long = "legacy-layout")]
        legacy_layout: bool,
        /// Print the full outcome as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Prints the descriptor and metadata file a build would stage
    Render {
        #[command(flatten)]
        meta: MetadataArgs,
    },
    /// Shows what dir2rpm does
    About,
    /// Prints the dir2rpm version
    Version,
}

#[derive(Args)]
struct MetadataArgs {
    /// Directory whose contents become the package
    dir: PathBuf,
    /// Seed field values from a saved metadata file; flags override it
    #[arg(short = 'm', long = "metadata", value_name = "FILE")]
    metadata_file: Option<PathBuf>,
    /// Package name (defaults to the directory name)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
    /// Package version (defaults to today's date)
    #[arg(long = "version")]
    version: Option<String>,
    #[arg(short = 'r', long = "release")]
    release: Option<String>,
    #[arg(short = 's', long = "summary")]
    summary: Option<String>,
    #[arg(short = 'd', long = "description")]
    description: Option<String>,
    #[arg(short = 'l', long = "license")]
    license: Option<String>,
    /// noarch, x86_64, i386 or arm
    #[arg(short = 'a', long = "arch")]
    architecture: Option<String>,
    #[arg(long = "vendor")]
    vendor: Option<String>,
    /// Comma-separated dependencies
    #[arg(long = "depends")]
    dependencies: Option<String>,
    #[arg(long = "pre-install", value_name = "FILE")]
    pre_install: Option<PathBuf>,
    #[arg(long = "post-install", value_name = "FILE")]
    post_install: Option<PathBuf>,
    #[arg(long = "pre-uninstall", value_name = "FILE")]
    pre_uninstall: Option<PathBuf>,
    #[arg(long = "post-uninstall", value_name = "FILE")]
    post_uninstall: Option<PathBuf>,
}

impl MetadataArgs {
    fn raw_metadata(&self) -> Result<RawMetadata, Dir2RpmError> {
        let mut raw = match &self.metadata_file {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .map_err(|e| Dir2RpmError::io(format!("could not read metadata file '{}'", path.display()), e))?;
                parse_sidecar(&text)
            }
            None => RawMetadata::default(),
        };
        let overrides = [
            (&mut raw.name, &self.name),
            (&mut raw.version, &self.version),
            (&mut raw.release, &self.release),
            (&mut raw.summary, &self.summary),
            (&mut raw.description, &self.description),
            (&mut raw.license, &self.license),
            (&mut raw.architecture, &self.architecture),
            (&mut raw.vendor, &self.vendor),
            (&mut raw.dependencies, &self.dependencies),
        ];
        for (field, value) in overrides {
            if let Some(v) = value {
                *field = v.clone();
            }
        }
        Ok(raw)
    }

    fn scripts(&self) -> Result<LifecycleScripts, Dir2RpmError> {
        let mut scripts = LifecycleScripts::new();
        let files = [
            (ScriptKind::PreInstall, &self.pre_install),
            (ScriptKind::PostInstall, &self.post_install),
            (ScriptKind::PreUninstall, &self.pre_uninstall),
            (ScriptKind::PostUninstall, &self.post_uninstall),
        ];
        for (kind, path) in files {
            if let Some(p) = path {
                scripts.load(kind, p)?;
            }
        }
        Ok(scripts)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Build { meta, tool, output_dir, build_root, timeout, legacy_layout, json } => {
            let mut cfg = AppConfig::load();
            if let Some(p) = output_dir { cfg.output_dir = Some(p); }
            if let Some(p) = build_root { cfg.build_root = p; }
            if let Some(secs) = timeout { cfg.timeout = (secs > 0).then(|| Duration::from_secs(secs)); }
            if legacy_layout { cfg.layout = StagingLayout::Legacy; }

            let (fields, scripts) = match meta.raw_metadata().and_then(|r| Ok((r, meta.scripts()?))) {
                Ok(v) => v,
                Err(e) => {
                    eprintln!("{}", format!("Error: {}", e).red());
                    return ExitCode::FAILURE;
                }
            };
            let request = BuildRequest {
                source_dir: meta.dir.clone(),
                fields,
                scripts,
                tool_path: tool.unwrap_or_else(|| cfg.tool_path.clone()),
            };

            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(120));
            if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {elapsed_precise} {msg}") {
                pb.set_style(style);
            }
            pb.set_message(format!("Building RPM from {}...", request.source_dir.display()));
            let outcome = Pipeline::new(&cfg, &SystemClock).run(&request);
            pb.finish_and_clear();

            if json {
                match serde_json::to_string_pretty(&outcome) {
                    Ok(s) => println!("{}", s),
                    Err(e) => eprintln!("{}", format!("Could not encode outcome: {}", e).red()),
                }
            } else {
                print_outcome(&outcome);
            }

            if outcome.result.is_success() { ExitCode::SUCCESS } else { ExitCode::FAILURE }
        }
        Commands::Render { meta } => {
            let cfg = AppConfig::load();
            let clock = SystemClock;
            let rendered = meta.raw_metadata().and_then(|raw| {
                let scripts = meta.scripts()?;
                let pkg = validate_and_default(&raw, &meta.dir, &clock)?;
                let text = descriptor::render(&pkg, &scripts, clock.today())?;
                Ok((text, render_sidecar(&pkg), pkg.artifact_name(&cfg.artifact_extension)))
            });
            match rendered {
                Ok((text, sidecar, artifact)) => {
                    println!("{}", format!("# descriptor for {}", artifact).dimmed());
                    print!("{}", text);
                    println!();
                    println!("{}", "# metadata".dimmed());
                    print!("{}", sidecar);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("{}", format!("Error: {}", e).red());
                    ExitCode::FAILURE
                }
            }
        }
        Commands::About => {
            println!("{}", "dir2rpm: create installable RPMs from a plain directory".blue());
            println!("{}", "Wraps an external build tool, stages its inputs and collects the resulting package.".yellow());
            ExitCode::SUCCESS
        }
        Commands::Version => {
            println!("dir2rpm v{} ({})", VERSION, std::env::consts::ARCH);
            ExitCode::SUCCESS
        }
    }
}

fn print_outcome(outcome: &BuildOutcome) {
    if !outcome.stdout.trim().is_empty() {
        println!("{}", "--- build tool output ---".dimmed());
        print!("{}", outcome.stdout);
        if !outcome.stdout.ends_with('\n') { println!(); }
    }
    if !outcome.stderr.trim().is_empty() {
        eprintln!("{}", "--- build tool errors ---".dimmed());
        eprint!("{}", outcome.stderr.yellow());
        if !outcome.stderr.ends_with('\n') { eprintln!(); }
    }

    match &outcome.result {
        BuildResult::Success { artifact_path } => {
            println!("{} {}", "RPM created:".green().bold(), artifact_path.display());
            if let Some(sum) = &outcome.artifact_sha256 {
                println!("  {} {}", "sha256".dimmed(), sum);
            }
        }
        BuildResult::Failure(f) => {
            eprintln!("{} {}", format!("Failed to create RPM ({:?}):", f.stage).red().bold(), f.diagnostic.red());
            for candidate in &f.candidates {
                eprintln!("  {} {}", "found instead:".yellow(), candidate.display());
            }
        }
    }

    for w in &outcome.warnings {
        eprintln!("{} {}", "Warning:".yellow(), w);
    }
}
