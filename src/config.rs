//! Configuration management for gemiso.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.
//!
//! The resulting `Config` is immutable and constructed exactly once in
//! `main`; every component receives it by reference. Nothing in the crate
//! reads ambient global state.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the prebuilt kernel image, relative to the project root.
pub const DEFAULT_KERNEL_IMAGE: &str =
    "external_dependencies/linux-6.6.14/arch/x86/boot/bzImage";

/// Default name of the final bootable image.
pub const DEFAULT_ISO_OUTPUT: &str = "GeminiOS.iso";

/// Candidate library directories inside a rootfs, highest priority first.
///
/// The resolver takes the first directory that contains a requested name,
/// so the order here is load-bearing.
pub const DEFAULT_LIB_SEARCH_ORDER: &[&str] = &["lib64", "usr/lib64", "lib", "usr/lib"];

/// Gemiso configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root; everything else lives under it.
    pub root_dir: PathBuf,
    /// Target filesystem being assembled.
    pub rootfs_dir: PathBuf,
    /// Run-wide staging tree (build-time headers/libraries of earlier packages).
    pub staging_dir: PathBuf,
    /// Per-package build script directories (`ports/<name>/build.sh`).
    pub ports_dir: PathBuf,
    /// Per-package build logs.
    pub logs_dir: PathBuf,
    /// ISO staging directory.
    pub iso_dir: PathBuf,
    /// Exported .gpkg archives.
    pub export_dir: PathBuf,
    /// Initramfs work tree.
    pub initramfs_build_dir: PathBuf,
    /// Build-system scripts and data.
    pub build_system_dir: PathBuf,
    /// Baseline environment script sourced by every build.
    pub env_config: PathBuf,
    /// Target environment overlay, skipped for bootstrap packages.
    pub target_env: PathBuf,
    /// Package manifest file (name -> expected artifact paths).
    pub manifest_file: PathBuf,
    /// Prebuilt kernel image (KERNEL_IMAGE).
    pub kernel_image: PathBuf,
    /// Final ISO path (ISO_OUTPUT).
    pub iso_output: PathBuf,
    /// Ordered candidate library directories for dependency resolution.
    pub lib_search_order: Vec<String>,
}

impl Config {
    /// Load configuration for a project root from .env and the environment.
    pub fn load(root_dir: &Path) -> Self {
        let mut env_vars = HashMap::new();

        // Try to load .env file
        let env_path = root_dir.join(".env");
        if env_path.exists() {
            if let Ok(content) = fs::read_to_string(&env_path) {
                for line in content.lines() {
                    let line = line.trim();
                    // Skip comments and empty lines
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    // Parse KEY=value
                    if let Some((key, value)) = line.split_once('=') {
                        let key = key.trim();
                        let value = value.trim();
                        // Remove quotes if present
                        let value = value.trim_matches('"').trim_matches('\'');
                        env_vars.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        let resolve = |value: &str| {
            let path = PathBuf::from(value);
            if path.is_absolute() {
                path
            } else {
                root_dir.join(path)
            }
        };

        let kernel_image = env_vars
            .get("KERNEL_IMAGE")
            .map(|s| resolve(s))
            .unwrap_or_else(|| root_dir.join(DEFAULT_KERNEL_IMAGE));

        let iso_output = env_vars
            .get("ISO_OUTPUT")
            .map(|s| resolve(s))
            .unwrap_or_else(|| root_dir.join(DEFAULT_ISO_OUTPUT));

        // LIB_SEARCH_ORDER is colon-separated, rootfs-relative
        let lib_search_order = env_vars
            .get("LIB_SEARCH_ORDER")
            .map(|s| {
                s.split(':')
                    .filter(|p| !p.is_empty())
                    .map(|p| p.to_string())
                    .collect()
            })
            .unwrap_or_else(|| {
                DEFAULT_LIB_SEARCH_ORDER
                    .iter()
                    .map(|p| p.to_string())
                    .collect()
            });

        let build_system_dir = root_dir.join("build_system");

        Self {
            root_dir: root_dir.to_path_buf(),
            rootfs_dir: root_dir.join("rootfs"),
            staging_dir: root_dir.join("staging"),
            ports_dir: root_dir.join("ports"),
            logs_dir: root_dir.join("logs"),
            iso_dir: root_dir.join("isodir"),
            export_dir: root_dir.join("exports"),
            initramfs_build_dir: root_dir.join("initramfs_build"),
            env_config: build_system_dir.join("env_config.sh"),
            target_env: build_system_dir.join("target_env.sh"),
            manifest_file: build_system_dir.join("package_manifests.json"),
            build_system_dir,
            kernel_image,
            iso_output,
            lib_search_order,
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  ROOT_DIR: {}", self.root_dir.display());
        println!("  KERNEL_IMAGE: {}", self.kernel_image.display());
        println!("  ISO_OUTPUT: {}", self.iso_output.display());
        println!("  LIB_SEARCH_ORDER: {}", self.lib_search_order.join(":"));
        if self.kernel_image.exists() {
            println!("  Kernel image: FOUND");
        } else {
            println!("  Kernel image: NOT FOUND (build the kernel as described in README.md)");
        }
    }
}
