//! Build state cleaning.
//!
//! All generated state is discarded wholesale; there is no partial rollback
//! anywhere else in the pipeline.

use anyhow::Result;
use std::fs;

use crate::config::Config;

/// Remove every generated directory, the exported archives and the ISO.
pub fn clean_all(config: &Config) -> Result<()> {
    println!("=== Cleaning GeminiOS Build Environment ===");

    let dirs = [
        &config.rootfs_dir,
        &config.staging_dir,
        &config.logs_dir,
        &config.iso_dir,
        &config.initramfs_build_dir,
        &config.export_dir,
    ];
    for dir in dirs {
        if dir.exists() {
            println!("[*] Removing {}...", dir.display());
            fs::remove_dir_all(dir)?;
        }
    }

    if config.iso_output.exists() {
        println!("[*] Removing {}...", config.iso_output.display());
        fs::remove_file(&config.iso_output)?;
    }
    let checksum = config.iso_output.with_extension("iso.sha256");
    if checksum.exists() {
        fs::remove_file(&checksum)?;
    }

    println!("[!] Clean completed.");
    Ok(())
}
