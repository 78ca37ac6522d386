//! Build orchestration over the fixed package sequence.
//!
//! Per-package state machine:
//!
//! ```text
//! PENDING -> (skip if verified) -> RUNNING -> VERIFIED
//!                                          -> FAILED_EXIT
//!                                          -> FAILED_VERIFICATION
//! ```
//!
//! This module sequences and gates; it never computes an order. A build is
//! one blocking external process with stdout+stderr captured to
//! `logs/<pkg>.log`; its exit code alone is not trusted — the manifest is
//! re-checked after every run.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::archive;
use crate::config::Config;
use crate::manifest::Manifest;
use crate::packages;
use crate::process::Cmd;
use crate::verify;

/// Log lines surfaced on a failed build.
const LOG_TAIL_LINES: usize = 10;

/// Terminal state of one package build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Manifest artifacts already present; build skipped.
    SkippedVerified,
    /// No build script exists for the package; explicit no-op success.
    NothingToBuild,
    /// Build ran, exited zero, and post-build verification passed.
    Verified,
    /// Build procedure returned a nonzero exit code.
    FailedExit(i32),
    /// Build exited zero but manifest artifacts are still missing
    /// ("succeeded but incomplete").
    FailedVerification(Vec<String>),
}

impl BuildStatus {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            BuildStatus::SkippedVerified | BuildStatus::NothingToBuild | BuildStatus::Verified
        )
    }
}

/// Outcome of one package build attempt.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub package: String,
    pub status: BuildStatus,
    pub duration: Duration,
}

/// Sequential, fail-fast build orchestrator.
pub struct Orchestrator<'a> {
    config: &'a Config,
    manifest: &'a Manifest,
    force: bool,
    debug: bool,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config, manifest: &'a Manifest, force: bool, debug: bool) -> Self {
        Self {
            config,
            manifest,
            force,
            debug,
        }
    }

    /// Build packages in the given order, stopping after the first failure.
    ///
    /// Returns an outcome per attempted package; the last outcome is the
    /// failing one when the run aborted early. I/O-level problems (log dir
    /// missing, packaging errors) surface as `Err`.
    pub fn run(&self, package_names: &[&str]) -> Result<Vec<BuildOutcome>> {
        fs::create_dir_all(&self.config.logs_dir)?;

        let total = package_names.len();
        let mut outcomes = Vec::with_capacity(total);

        for (i, name) in package_names.iter().enumerate() {
            let outcome = self.build_package(name, i + 1, total)?;
            let failed = !outcome.status.is_success();
            outcomes.push(outcome);
            if failed {
                break;
            }
        }

        Ok(outcomes)
    }

    /// Run the state machine for a single package.
    pub fn build_package(&self, name: &str, index: usize, total: usize) -> Result<BuildOutcome> {
        let start = Instant::now();
        let port_dir = self.config.ports_dir.join(name);
        let install_root = port_dir.join("root");

        if !self.force && verify::is_verified(self.manifest, self.config, name) {
            println!("[{}/{}] Skipping {} (Verified)", index, total, name);
            // Even a skipped package must land in staging: later packages in
            // this run expect its headers/libraries there.
            if install_root.is_dir() {
                archive::sync_staging(&self.config.staging_dir, &install_root)
                    .with_context(|| format!("Failed to stage {}", name))?;
            }
            return Ok(BuildOutcome {
                package: name.to_string(),
                status: BuildStatus::SkippedVerified,
                duration: start.elapsed(),
            });
        }

        print!("[{}/{}] Building {}...", index, total, name);
        std::io::stdout().flush().ok();

        let build_script = port_dir.join("build.sh");
        let log_file = self.config.logs_dir.join(format!("{}.log", name));
        if log_file.exists() {
            fs::remove_file(&log_file)?;
        }

        if !build_script.exists() {
            println!(" [SKIPPED] (No build script)");
            return Ok(BuildOutcome {
                package: name.to_string(),
                status: BuildStatus::NothingToBuild,
                duration: start.elapsed(),
            });
        }

        let status = self
            .build_command(name, &port_dir, &build_script)
            .run_logged(&log_file)?;
        let duration = start.elapsed();

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            println!(" [FAILED] (Check {})", log_file.display());
            print_log_tail(&log_file);
            return Ok(BuildOutcome {
                package: name.to_string(),
                status: BuildStatus::FailedExit(code),
                duration,
            });
        }

        // Post-build verification: exit code 0 is not enough.
        if verify::is_verified(self.manifest, self.config, name) {
            println!(" [DONE] ({:.2}s)", duration.as_secs_f64());
            if install_root.is_dir() {
                let gpkg = archive::export_package(self.config, name, &install_root)?;
                println!("  Exported {}", gpkg.display());
            }
            return Ok(BuildOutcome {
                package: name.to_string(),
                status: BuildStatus::Verified,
                duration,
            });
        }

        println!(" [FAILED VERIFICATION] (Artifacts missing)");
        let missing = verify::missing_artifacts(self.manifest, self.config, name);
        if !missing.is_empty() {
            println!("    Missing files from manifest:");
            for artifact in &missing {
                println!("     - {}", artifact);
            }
        }
        Ok(BuildOutcome {
            package: name.to_string(),
            status: BuildStatus::FailedVerification(missing),
            duration,
        })
    }

    /// Compose the structured invocation for a build script.
    ///
    /// Scripts are sourced so they inherit the functions env_config.sh
    /// defines, inside a subshell so their `exit`/`set -e` cannot kill the
    /// builder. Script paths travel as positional parameters — bash never
    /// sees them interpolated into command text.
    fn build_command(&self, name: &str, port_dir: &Path, build_script: &Path) -> Cmd {
        let debug_flag = if self.debug { "true" } else { "false" };

        let cmd = Cmd::new("bash")
            .dir(port_dir)
            // Clean baseline: contamination from the host environment makes
            // cross builds pick up host libraries.
            .env_remove("LD_LIBRARY_PATH")
            .env_remove("PYTHONHOME")
            .env_remove("PYTHONPATH")
            .env("ENABLE_DEBUG", debug_flag);

        if packages::is_bootstrap(name) {
            cmd.arg("-c")
                .arg(r#"source "$1" && ( source "$2" )"#)
                .arg("bash")
                .arg_path(&self.config.env_config)
                .arg_path(build_script)
        } else {
            cmd.arg("-c")
                .arg(r#"source "$1" && source "$2" && ( source "$3" )"#)
                .arg("bash")
                .arg_path(&self.config.env_config)
                .arg_path(&self.config.target_env)
                .arg_path(build_script)
        }
    }
}

/// Whether every outcome in a run succeeded.
pub fn all_succeeded(outcomes: &[BuildOutcome]) -> bool {
    outcomes.iter().all(|o| o.status.is_success())
}

/// Print the last few lines of a build log to help the user.
fn print_log_tail(log_file: &Path) {
    let Ok(content) = fs::read_to_string(log_file) else {
        return;
    };
    let lines: Vec<&str> = content.lines().collect();
    let tail = lines.len().saturating_sub(LOG_TAIL_LINES);

    println!("\n--- Last {} lines of log ---", LOG_TAIL_LINES);
    for line in &lines[tail..] {
        println!("  {}", line.trim());
    }
    println!("----------------------------");
}
