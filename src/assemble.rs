//! Image-assembly pipeline.
//!
//! A fixed sequence of stages executed strictly in order with no retries:
//! the first failing stage aborts the run with a nonzero exit, leaving
//! partial state on disk for inspection (`--clean` discards it wholesale).

use anyhow::{bail, Context, Result};
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::initramfs;
use crate::iso;
use crate::manifest::Manifest;
use crate::orchestrator::{self, Orchestrator};
use crate::rootfs;
use crate::timing::Timer;

/// Host tools the pipeline shells out to.
const REQUIRED_TOOLS: &[&str] = &["bash", "ldd", "mksquashfs", "cpio", "lz4", "grub-mkrescue"];

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    PrepRootfs,
    SyncKernel,
    BuildPackages,
    Finalize,
    VerifyIntegrity,
    CompressRootfs,
    BuildInitramfs,
    StageKernel,
    WriteBootConfig,
    BuildIso,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::PrepRootfs => "prepare rootfs",
            Stage::SyncKernel => "sync kernel",
            Stage::BuildPackages => "build packages",
            Stage::Finalize => "finalize rootfs",
            Stage::VerifyIntegrity => "verify integrity",
            Stage::CompressRootfs => "compress rootfs",
            Stage::BuildInitramfs => "build initramfs",
            Stage::StageKernel => "stage kernel",
            Stage::WriteBootConfig => "write boot config",
            Stage::BuildIso => "build ISO",
        };
        f.write_str(name)
    }
}

/// Check that every required host tool is on PATH, naming all missing ones
/// at once rather than failing on the first.
pub fn preflight() -> Result<()> {
    let missing: Vec<&str> = REQUIRED_TOOLS
        .iter()
        .copied()
        .filter(|tool| which::which(tool).is_err())
        .collect();

    if !missing.is_empty() {
        bail!(
            "Missing required host tools: {}. Install them and retry.",
            missing.join(", ")
        );
    }
    Ok(())
}

/// Run the full pipeline: package builds followed by image assembly.
///
/// `packages` is the ordered list to build (the full order or a CLI-chosen
/// subset). With `skip_image`, the pipeline stops after BuildPackages.
pub fn run(
    config: &Config,
    manifest: &Manifest,
    packages: &[&str],
    force: bool,
    debug: bool,
    skip_image: bool,
) -> Result<()> {
    preflight()?;
    let mut total = Duration::ZERO;

    total += run_stage(Stage::PrepRootfs, || rootfs::prepare_rootfs(config))?;
    total += run_stage(Stage::SyncKernel, || {
        rootfs::sync_kernel(config).map(|_| ())
    })?;

    println!("\n=== GeminiOS Ports Builder ===");
    let orchestrator = Orchestrator::new(config, manifest, force, debug);
    let outcomes = orchestrator
        .run(packages)
        .context("Package build loop failed")?;
    if !orchestrator::all_succeeded(&outcomes) {
        let failed = outcomes
            .last()
            .expect("a failed run has at least one outcome");
        bail!("Build failed at package '{}'", failed.package);
    }
    total += outcomes.iter().map(|o| o.duration).sum::<Duration>();

    if skip_image {
        println!("\n[!] Packages built; image assembly skipped.");
        return Ok(());
    }

    println!("\n=== Packaging GeminiOS ISO (Live CD) ===");
    total += run_stage(Stage::Finalize, || rootfs::finalize_rootfs(config))?;
    total += run_stage(Stage::VerifyIntegrity, || rootfs::verify_integrity(config))?;
    total += run_stage(Stage::CompressRootfs, || iso::compress_rootfs(config))?;
    total += run_stage(Stage::BuildInitramfs, || {
        initramfs::build_initramfs(config).map(|_| ())
    })?;
    total += run_stage(Stage::StageKernel, || iso::stage_kernel(config))?;
    total += run_stage(Stage::WriteBootConfig, || iso::write_boot_config(config))?;
    total += run_stage(Stage::BuildIso, || iso::build_iso(config))?;

    println!("\n  Total pipeline time: {:.1}s", total.as_secs_f64());
    Ok(())
}

fn run_stage<F>(stage: Stage, f: F) -> Result<Duration>
where
    F: FnOnce() -> Result<()>,
{
    let timer = Timer::start(stage.to_string());
    let result = f().with_context(|| format!("Stage '{}' failed", stage));
    let elapsed = timer.finish();
    result.map(|()| elapsed)
}
