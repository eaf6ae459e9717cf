//! Logging setup: colorized stderr for interactive use, plus the two truncated-at-open
//! project log files from spec §6 (`Logs/Debug.log`, `Logs/WarningsErrors.log`).

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Dual-sink logger: forwards every record to `env_logger`'s formatter on stderr, and also
/// appends to Debug.log (everything) and WarningsErrors.log (warn/error only).
struct ProjectLogger {
    stderr: env_logger::Logger,
    debug_log: Mutex<File>,
    warn_log: Mutex<File>,
}

impl Log for ProjectLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.stderr.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.stderr.log(record);

        let line = format!(
            "[{}] {} {}: {}\n",
            chrono::Utc::now().to_rfc3339(),
            record.level(),
            record.target(),
            record.args()
        );
        if let Ok(mut f) = self.debug_log.lock() {
            let _ = f.write_all(line.as_bytes());
        }
        if matches!(record.level(), Level::Warn | Level::Error)
            && let Ok(mut f) = self.warn_log.lock()
        {
            let _ = f.write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        self.stderr.flush();
    }
}

/// Initialize logging: crate-level filter controlled by `verbose`, dependency noise capped at
/// Warn, matching the teacher's `utils/logger.rs` split. If `project_dir` is given, also opens
/// (truncating) the two log files under `<project_dir>/Logs/`.
pub fn setup_logging(verbose: bool, project_dir: Option<&Path>) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let builder = env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Warn)
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        Level::Error => "ERROR".red(),
                        _ => unreachable!(),
                    };
                    format!(
                        "[{} {} {}] {}",
                        name.cyan(),
                        level_str,
                        record.target().to_string().white(),
                        record.args()
                    )
                }
                _ => format!("[{}] {}", name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .filter_level(level)
        .build();

    let Some(project_dir) = project_dir else {
        log::set_max_level(level);
        let _ = log::set_boxed_logger(Box::new(builder));
        return;
    };

    let logs_dir = project_dir.join(crate::config::PackagePaths::get().logs_dir_name());
    if std::fs::create_dir_all(&logs_dir).is_err() {
        log::set_max_level(level);
        let _ = log::set_boxed_logger(Box::new(builder));
        return;
    }
    let debug_path = logs_dir.join(crate::config::PackagePaths::get().debug_log_name());
    let warn_path = logs_dir.join(crate::config::PackagePaths::get().warnings_log_name());
    let (Ok(debug_log), Ok(warn_log)) = (File::create(&debug_path), File::create(&warn_path))
    else {
        log::set_max_level(level);
        let _ = log::set_boxed_logger(Box::new(builder));
        return;
    };

    let logger = ProjectLogger {
        stderr: builder,
        debug_log: Mutex::new(debug_log),
        warn_log: Mutex::new(warn_log),
    };
    log::set_max_level(LevelFilter::Debug);
    let _ = log::set_boxed_logger(Box::new(logger));
}

/// ANSI color tags for diff-style output (added/removed/modified), matching the teacher's
/// `utils::Colors` helper.
pub struct Colors;

impl Colors {
    pub const ADDED: &'static str = "green";
    pub const REMOVED: &'static str = "red";
    pub const MODIFIED: &'static str = "yellow";

    pub fn colorize(color: &str, text: &str) -> String {
        match color {
            "green" => text.green().to_string(),
            "red" => text.red().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}
