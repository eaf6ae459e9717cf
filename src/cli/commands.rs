//! Command handlers: one function per [`super::args::Commands`] variant, each opening the store,
//! running its stage through [`PipelineOrchestrator`], and reporting a short summary — matching
//! the teacher's `engine::handle_index`/`handle_check` split of "one function per subcommand".

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::WorkerThreadLimits;
use crate::error::{EngineError, Result};
use crate::pipeline::enumerator::EnumerationFilter;
use crate::pipeline::orchestrator::PipelineOrchestrator;
use crate::pipeline::progress::ProgressCounters;
use crate::pipeline::verification;
use crate::store::{
    Store, copy_jobs_repo, file_instances_repo, hashes_repo, scan_roots_repo, settings_repo,
};
use crate::types::{CopyJobStatus, CpuProfile, FileStatus, HashAlgorithm, VolumeType};
use crate::utils::ProjectPaths;

use super::args::{Cli, Commands};

fn parse_hash_level(s: &str) -> Result<HashAlgorithm> {
    match s.to_ascii_lowercase().as_str() {
        "sha1" => Ok(HashAlgorithm::Sha1),
        "sha256" => Ok(HashAlgorithm::Sha256),
        "sha3-256" | "sha3_256" | "sha3" => Ok(HashAlgorithm::Sha3_256),
        "sizename" | "size-name" => Ok(HashAlgorithm::SizeName),
        other => Err(EngineError::Configuration(format!("unknown hash level: {other}"))),
    }
}

pub(crate) fn parse_cpu_profile(s: &str) -> Result<CpuProfile> {
    match s.to_ascii_lowercase().as_str() {
        "eco" => Ok(CpuProfile::Eco),
        "balanced" => Ok(CpuProfile::Balanced),
        "fast" => Ok(CpuProfile::Fast),
        "max" => Ok(CpuProfile::Max),
        other => Err(EngineError::Configuration(format!("unknown cpu profile: {other}"))),
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let project_paths = ProjectPaths::new(cli.project_dir.clone());
    project_paths
        .ensure_exists()
        .map_err(|e| EngineError::from_io(&cli.project_dir, e))?;
    crate::logging::setup_logging(cli.verbose, Some(&cli.project_dir));

    let store = Arc::new(Store::open(&project_paths.db_path())?);
    ensure_settings_row(&store, &cli.project_dir)?;

    match cli.command {
        Commands::Init { name, hash_level, cpu_profile } => init(&store, name, hash_level, cpu_profile),
        Commands::AddRoot { path, label } => add_root(&store, path, label),
        Commands::Scan => run_scan(&store),
        Commands::Hash => run_hash(&store),
        Commands::Plan => run_plan(&store),
        Commands::Copy { target } => run_copy(&store, &target),
        Commands::Verify => run_verify(&store),
        Commands::Status => print_status(&store),
    }
}

/// A freshly created store has no Project Settings row; seed one with defaults (merged with
/// `.mediavault.toml` if present) so every other command can assume it exists (spec §9: enforced
/// single row, upserted — never inserted ad hoc).
fn ensure_settings_row(store: &Store, project_dir: &std::path::Path) -> Result<()> {
    let exists = {
        let handle = store.acquire_read_handle()?;
        settings_repo::get_settings(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .is_some()
    };
    if exists {
        return Ok(());
    }
    let mut defaults = crate::types::ProjectSettings::default();
    if let Some(file) = super::project_toml::load(project_dir) {
        super::project_toml::apply(&file, &mut defaults);
    }
    let write = store.acquire_write_handle();
    write
        .submit(move |conn| settings_repo::upsert_settings(conn, &defaults))
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))
}

fn init(
    store: &Store,
    name: Option<String>,
    hash_level: Option<String>,
    cpu_profile: Option<String>,
) -> Result<()> {
    let (mut settings, hashes_recorded) = {
        let handle = store.acquire_read_handle()?;
        let conn = handle.conn();
        let settings = settings_repo::get_settings(conn)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .unwrap_or_default();
        let hashes_recorded = hashes_repo::count_all(conn)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            > 0;
        (settings, hashes_recorded)
    };
    if let Some(name) = name {
        settings.project_name = name;
    }
    if let Some(h) = hash_level {
        let requested = parse_hash_level(&h)?;
        if hashes_recorded && requested != settings.hash_level {
            return Err(EngineError::Configuration(format!(
                "cannot change hash level from {} to {}: this project already has hashed files; \
                 the hash algorithm is fixed for a project's lifetime once the first Hash row is written",
                settings.hash_level.as_str(),
                requested.as_str()
            )));
        }
        settings.hash_level = requested;
    }
    if let Some(c) = cpu_profile {
        settings.cpu_profile = parse_cpu_profile(&c)?;
    }
    settings.last_modified_utc = Utc::now();

    let write = store.acquire_write_handle();
    write
        .submit(move |conn| settings_repo::upsert_settings(conn, &settings))
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    log::info!("project settings saved");
    Ok(())
}

fn add_root(store: &Store, path: PathBuf, label: Option<String>) -> Result<()> {
    let absolute = path
        .canonicalize()
        .map_err(|e| EngineError::from_io(&path, e))?;
    if crate::path_tools::is_root_owned(&absolute) {
        log::warn!(
            "{} is root-owned; scanning it may surface files this process cannot later copy back out",
            absolute.display()
        );
    }
    let label = label.unwrap_or_else(|| {
        absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| absolute.to_string_lossy().to_string())
    });
    let path_str = absolute.to_string_lossy().to_string();
    let now = Utc::now();
    let write = store.acquire_write_handle();
    let id = write
        .submit(move |conn| {
            scan_roots_repo::insert_scan_root(conn, &path_str, &label, VolumeType::Unknown, now)
        })
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
    log::info!("scan root {} added as id {}", absolute.display(), id);
    Ok(())
}

fn default_filter() -> EnumerationFilter {
    EnumerationFilter {
        allowed_extensions: Default::default(),
        min_size_bytes: None,
        max_size_bytes: None,
        exclude_patterns: Vec::new(),
    }
}

fn run_scan(store: &Arc<Store>) -> Result<()> {
    let orchestrator = PipelineOrchestrator::open(Arc::clone(store))?;
    let counters = ProgressCounters::new();
    orchestrator.run_scan(&default_filter(), counters.clone())?;
    log::info!(
        "scan complete: {} candidates discovered",
        counters.total_files.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}

fn run_hash(store: &Arc<Store>) -> Result<()> {
    let orchestrator = PipelineOrchestrator::open(Arc::clone(store))?;
    let settings = {
        let handle = store.acquire_read_handle()?;
        settings_repo::get_settings(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .unwrap_or_default()
    };
    let avail = WorkerThreadLimits::current().all_threads;
    let (hashers, _copy_workers, _ui_hz) = settings.cpu_profile.worker_counts(avail);
    let hashers = crate::fd_limit::cap_worker_count(hashers);
    let counters = ProgressCounters::new();
    orchestrator.run_hash(hashers, counters.clone())?;
    log::info!(
        "hash complete: {} files hashed, {} errors",
        counters.done_files.load(std::sync::atomic::Ordering::Relaxed),
        counters.error_count.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}

fn run_plan(store: &Arc<Store>) -> Result<()> {
    let orchestrator = PipelineOrchestrator::open(Arc::clone(store))?;
    let summary = orchestrator.run_plan()?;
    log::info!(
        "plan built: {} unique files across {} folders",
        summary.unique_file_count, summary.folder_count
    );
    Ok(())
}

fn run_copy(store: &Arc<Store>, target: &std::path::Path) -> Result<()> {
    let orchestrator = PipelineOrchestrator::open(Arc::clone(store))?;
    let settings = {
        let handle = store.acquire_read_handle()?;
        settings_repo::get_settings(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .unwrap_or_default()
    };
    let avail = WorkerThreadLimits::current().all_threads;
    let (_hashers, copy_workers, _ui_hz) = settings.cpu_profile.worker_counts(avail);
    let copy_workers = crate::fd_limit::cap_worker_count(copy_workers);
    let counters = ProgressCounters::new();
    orchestrator.run_copy(target, copy_workers, counters.clone())?;
    log::info!(
        "copy complete: {} files copied, {} errors",
        counters.done_files.load(std::sync::atomic::Ordering::Relaxed),
        counters.error_count.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}

fn run_verify(store: &Store) -> Result<()> {
    let settings = {
        let handle = store.acquire_read_handle()?;
        settings_repo::get_settings(handle.conn())
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
            .unwrap_or_default()
    };
    let avail = WorkerThreadLimits::current().all_threads;
    let (hashers, _copy_workers, _ui_hz) = settings.cpu_profile.worker_counts(avail);
    let records = verification::run(
        store,
        settings.hash_level,
        hashers,
        crate::pipeline::control::CancellationToken::new(),
    )?;
    let matched = records.iter().filter(|r| r.outcome == crate::types::VerificationOutcome::Matched).count();
    log::info!("verification complete: {}/{} matched", matched, records.len());
    for record in records.iter().filter(|r| r.outcome != crate::types::VerificationOutcome::Matched) {
        log::warn!(
            "copy job {}: {:?}{}",
            record.copy_job_id,
            record.outcome,
            if record.was_renamed { " (destination was renamed by conflict resolution)" } else { "" }
        );
    }
    Ok(())
}

fn print_status(store: &Store) -> Result<()> {
    let handle = store.acquire_read_handle()?;
    let conn = handle.conn();
    let settings = settings_repo::get_settings(conn)
        .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?
        .unwrap_or_default();
    println!("state: {}", settings.current_state.as_str());

    for status in [
        FileStatus::Discovered,
        FileStatus::HashPending,
        FileStatus::Hashed,
        FileStatus::CopyPlanned,
        FileStatus::Copied,
        FileStatus::Verified,
        FileStatus::Error,
    ] {
        let count = file_instances_repo::count_by_status(conn, status)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        println!("  files {}: {}", status.as_str(), count);
    }
    for status in [
        CopyJobStatus::Pending,
        CopyJobStatus::InProgress,
        CopyJobStatus::Copied,
        CopyJobStatus::Verified,
        CopyJobStatus::Skipped,
        CopyJobStatus::Error,
    ] {
        let count = copy_jobs_repo::count_by_status(conn, status)
            .map_err(|e| EngineError::StorageIntegrity(e.to_string()))?;
        println!("  copy jobs {}: {}", status.as_str(), count);
    }
    if let Some(error) = &settings.last_error {
        println!("last error: {error}");
    }
    Ok(())
}
