//! Command handlers; each returns the process exit code
//!
//! - 0: success
//! - 1: error diagnostics were reported or a descriptor could not be written
//! - 2: fatal error (bad input, invalid configuration, cancelled build)

use super::commands::{BuildArgs, CheckArgs, NameArgs, ProjectArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::build::{Batch, CancelToken, EventLoopCoordinator, FsDocumentStore};
use crate::config::ScrgenConfig;
use crate::fs::{FileSystem, RealFileSystem};
use crate::model::source::SourceSnapshot;
use crate::names::{map_class_name, map_name};
use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERRORS: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

fn is_snapshot_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("yaml") | Some("yml")
    )
}

fn read_snapshot_file(path: &Path) -> Result<SourceSnapshot> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => {
            SourceSnapshot::from_yaml(&text).with_context(|| format!("Failed to parse snapshot {}", path.display()))
        }
        _ => SourceSnapshot::from_json(&text).with_context(|| format!("Failed to parse snapshot {}", path.display())),
    }
}

/// Reads one snapshot file, or merges every snapshot file below a directory
/// in path order (git-ignored files are skipped)
pub fn load_snapshot(path: &Path) -> Result<SourceSnapshot> {
    if path.is_file() {
        return read_snapshot_file(path);
    }
    if !path.is_dir() {
        bail!("Snapshot path does not exist: {}", path.display());
    }

    let mut files = Vec::new();
    for result in WalkBuilder::new(path).hidden(false).git_ignore(true).build() {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Failed to read directory entry");
                continue;
            }
        };
        if entry.path().is_file() && is_snapshot_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    if files.is_empty() {
        bail!("No snapshot files found in {}", path.display());
    }
    files.sort();

    let mut snapshot = SourceSnapshot::default();
    for file in &files {
        debug!("Reading snapshot {}", file.display());
        snapshot.merge(read_snapshot_file(file)?);
    }
    Ok(snapshot)
}

fn project_dir(args: &ProjectArgs) -> Result<PathBuf> {
    let dir = match &args.project_dir {
        Some(dir) => dir.clone(),
        None => env::current_dir().context("Failed to get current directory")?,
    };
    if !dir.is_dir() {
        bail!("Project directory does not exist: {}", dir.display());
    }
    Ok(dir)
}

/// Environment and `scrgen.toml`, overridden by command line flags
pub fn resolve_config(project_dir: &Path, args: &ProjectArgs, fs: &dyn FileSystem) -> Result<ScrgenConfig> {
    let mut config = ScrgenConfig::load(project_dir, fs)?;
    if let Some(output_path) = &args.output_path {
        config.output_path = output_path.clone();
    }
    if let Some(version) = args.spec_version {
        config.spec_version = version;
    }
    if let Some(level) = args.validation_level {
        config.validation_level = level;
    }
    if let Some(level) = args.missing_unbind_level {
        config.missing_unbind_level = Some(level);
    }
    Ok(config)
}

fn print(output: &str) {
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
}

pub async fn handle_build(args: &BuildArgs) -> i32 {
    match run_build(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FATAL
        }
    }
}

async fn run_build(args: &BuildArgs) -> Result<i32> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let project_dir = project_dir(&args.project)?;
    let mut config = resolve_config(&project_dir, &args.project, fs.as_ref())?;
    if let Some(timeout) = args.commit_timeout {
        config.commit_timeout_secs = timeout;
    }
    if let Some(parallelism) = args.parallelism {
        config.parallelism = parallelism;
    }
    config.validate()?;
    debug!("{}", config);

    let snapshot = Arc::new(load_snapshot(&args.project.snapshot)?);
    info!("Loaded {} unit(s) from {}", snapshot.units.len(), args.project.snapshot.display());

    let cancel = CancelToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; finishing the descriptor in progress");
                cancel.cancel();
            }
        })
    };

    let store = FsDocumentStore::new(fs.clone(), &project_dir);
    let coordinator = Arc::new(EventLoopCoordinator::spawn(Box::new(store), config.commit_timeout()));
    let batch = Batch::new(&config, &project_dir, fs).full(args.full);
    let report = batch.run(snapshot, coordinator.clone(), &cancel).await;
    interrupt.abort();

    match Arc::try_unwrap(coordinator) {
        Ok(coordinator) => coordinator.shutdown().await,
        Err(_) => warn!("Document store still in use at shutdown"),
    }

    let formatter = OutputFormatter::new(OutputFormat::from(args.project.format));
    print(&formatter.format_batch(&report)?);

    Ok(if report.cancelled {
        EXIT_FATAL
    } else if report.has_errors() || report.failures().next().is_some() {
        EXIT_ERRORS
    } else {
        EXIT_SUCCESS
    })
}

pub fn handle_check(args: &CheckArgs) -> i32 {
    match run_check(args) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_FATAL
        }
    }
}

fn run_check(args: &CheckArgs) -> Result<i32> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let project_dir = project_dir(&args.project)?;
    let config = resolve_config(&project_dir, &args.project, fs.as_ref())?;
    config.validate()?;

    let snapshot = load_snapshot(&args.project.snapshot)?;
    let units = Batch::new(&config, &project_dir, fs).check(&snapshot);

    let formatter = OutputFormatter::new(OutputFormat::from(args.project.format));
    print(&formatter.format_check(&units, &config.output_path)?);

    Ok(if units.iter().any(|u| u.has_errors()) {
        EXIT_ERRORS
    } else {
        EXIT_SUCCESS
    })
}

pub fn handle_name(args: &NameArgs) -> i32 {
    let prefix = args.prefix.as_deref();
    let property = if args.class_name {
        map_class_name(&args.identifier, prefix, args.spec_version)
    } else {
        map_name(&args.identifier, prefix, args.spec_version)
    };

    match OutputFormatter::new(OutputFormat::Human).format_name(&args.identifier, &property) {
        Ok(output) => {
            print(&output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            EXIT_FATAL
        }
    }
}
