//! Target filesystem preparation, finalization and integrity checking.
//!
//! The rootfs keeps every library under `lib64` (with `usr/lib64` for
//! packages that insist on a usr prefix); `lib` and `usr/lib` are symlinks,
//! never real directories. Preparation migrates any pre-existing real
//! content before converting them.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

use crate::archive;
use crate::config::Config;
use crate::process::Cmd;

/// Directory skeleton created before any package builds.
const ROOTFS_SKELETON: &[&str] = &[
    "bin",
    "boot",
    "proc",
    "sys",
    "dev",
    "etc",
    "tmp",
    "mnt",
    "run",
    "sbin",
    "lib64",
    "var/repo",
    "var/log",
    "var/tmp",
    "usr/bin",
    "usr/share",
    "usr/local",
    "usr/lib64",
    "bin/apps/system",
];

/// Host runtime libraries every dynamically linked toolchain output needs,
/// with the places distros keep them.
const HOST_RUNTIME_LIBS: &[(&str, &[&str])] = &[
    (
        "libstdc++.so.6",
        &[
            "/usr/lib/x86_64-linux-gnu/libstdc++.so.6",
            "/usr/lib64/libstdc++.so.6",
            "/lib64/libstdc++.so.6",
        ],
    ),
    (
        "libgcc_s.so.1",
        &[
            "/usr/lib/x86_64-linux-gnu/libgcc_s.so.1",
            "/usr/lib64/libgcc_s.so.1",
            "/lib64/libgcc_s.so.1",
        ],
    ),
];

/// Alias directories converted to symlinks pointing at the canonical lib dir.
const LIB_ALIASES: &[(&str, &str)] = &[("lib", "lib64"), ("usr/lib", "lib64")];

/// Binaries that get the SUID bit in FINALIZE.
const SUID_BINARIES: &[&str] = &["bin/apps/system/su", "bin/apps/system/sudo"];

/// Convenience symlinks created in FINALIZE: (target, link), both
/// rootfs-relative. Order matters — bin/sh points at the bin/bash link
/// created just before it.
const SYSTEM_SYMLINKS: &[(&str, &str)] = &[
    ("usr/bin/Xorg", "usr/bin/X"),
    ("usr/bin/xinit", "usr/bin/startx"),
    ("usr/bin/bash", "bin/bash"),
    ("bin/bash", "bin/sh"),
    ("usr/bin/python3", "usr/bin/python"),
];

/// Critical paths checked by VERIFY_INTEGRITY, rootfs-relative.
const CRITICAL_FILES: &[&str] = &[
    "bin/init",
    "bin/bash",
    "bin/sh",
    "bin/gsh",
    "bin/login",
    "sbin/getty",
    "boot/kernel",
    "usr/lib/grub/i386-pc/modinfo.sh",
    "usr/share/terminfo/l/linux",
    "etc/passwd",
    "bin/apps/system/gtop",
    "lib64/libcrypt.so.1",
    "usr/lib64/libstdc++.so.6",
    "usr/lib64/libgcc_s.so.1",
    "usr/bin/python3",
    "usr/lib64/libglib-2.0.so",
    "usr/lib64/libgtk-3.so",
    "usr/share/mime/magic",
    "bin/apps/system/gpkg-worker",
    "usr/share/glib-2.0/schemas/gschemas.compiled",
    "usr/share/fonts/TTF/Inter-Regular.otf",
];

/// Marker file telling init this is a live boot (enables autologin).
/// The installer removes it from installed systems.
const LIVE_MARKER: &str = "etc/geminios-live";

/// PREP_ROOTFS: skeleton, host runtime libraries, lib symlink conversion,
/// tree-wide `.la` purge.
pub fn prepare_rootfs(config: &Config) -> Result<()> {
    println!("\n=== Preparing Rootfs Structure ===");

    for dir in ROOTFS_SKELETON {
        fs::create_dir_all(config.rootfs_dir.join(dir))?;
    }

    copy_host_runtime_libs(&config.rootfs_dir)?;
    standardize_lib_dirs(&config.rootfs_dir)?;

    let removed = archive::purge_la_files(&config.rootfs_dir)?;
    if removed > 0 {
        println!("[*] Removed {} stale .la files", removed);
    }

    Ok(())
}

/// Copy host libstdc++/libgcc into the rootfs so toolchain output runs
/// before gcc itself is built. Missing libraries are warnings: some hosts
/// keep them in unusual places and a later package may provide them.
fn copy_host_runtime_libs(rootfs: &Path) -> Result<()> {
    println!("[*] Copying host libstdc++ and libgcc...");

    for (name, candidates) in HOST_RUNTIME_LIBS {
        let found = candidates.iter().map(Path::new).find(|p| p.exists());
        match found {
            Some(src) => {
                let dest = rootfs.join("usr/lib64").join(name);
                fs::copy(src, &dest).with_context(|| {
                    format!("Failed to copy host library {}", src.display())
                })?;
                println!("  Copied {} to {}", src.display(), dest.display());
            }
            None => println!("  WARNING: Could not find host {}!", name),
        }
    }

    Ok(())
}

/// Convert `lib` and `usr/lib` into symlinks to the canonical lib dir,
/// migrating any real content first (existing files win, never overwritten).
fn standardize_lib_dirs(rootfs: &Path) -> Result<()> {
    for (alias, target) in LIB_ALIASES {
        let alias_path = rootfs.join(alias);
        if alias_path.is_symlink() {
            continue;
        }

        if alias_path.is_dir() {
            migrate_tree(&alias_path, &rootfs.join("lib64"))?;
            fs::remove_dir_all(&alias_path)?;
        }
        std::os::unix::fs::symlink(target, &alias_path)
            .with_context(|| format!("Failed to link {} to {}", alias, target))?;
        println!("[*] Linked {} to {}", alias, target);
    }

    Ok(())
}

/// Copy a tree into another, skipping entries that already exist.
fn migrate_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(from).expect("under walk root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest = to.join(rel);
        if dest.symlink_metadata().is_ok() {
            continue;
        }

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else if entry.file_type().is_symlink() {
            let link_target = fs::read_link(entry.path())?;
            std::os::unix::fs::symlink(link_target, &dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// SYNC_KERNEL: copy the prebuilt kernel into the rootfs boot directory.
///
/// A missing kernel is only a warning here; VERIFY_INTEGRITY makes it fatal
/// once the image is actually being assembled.
pub fn sync_kernel(config: &Config) -> Result<bool> {
    println!("\n=== Syncing Kernel Image ===");

    let dest = config.rootfs_dir.join("boot/kernel");
    if config.kernel_image.exists() {
        println!(
            "[*] Copying {} to {}",
            config.kernel_image.display(),
            dest.display()
        );
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&config.kernel_image, &dest)
            .with_context(|| format!("Failed to copy kernel to {}", dest.display()))?;
        Ok(true)
    } else {
        println!(
            "  WARNING: Kernel image not found at {}",
            config.kernel_image.display()
        );
        println!("    Ensure you have compiled the kernel as described in README.md");
        Ok(false)
    }
}

/// FINALIZE: permission fixups, convenience symlinks, derived databases and
/// the live-boot marker.
pub fn finalize_rootfs(config: &Config) -> Result<()> {
    println!("\n=== Finalizing Rootfs (Glue & Fixups) ===");
    let rootfs = &config.rootfs_dir;

    // 1. SUID bits for privilege escalation tools
    println!("[*] Setting SUID permissions...");
    for rel in SUID_BINARIES {
        let path = rootfs.join(rel);
        if path.exists() {
            let mode = path.metadata()?.permissions().mode();
            fs::set_permissions(&path, fs::Permissions::from_mode(mode | 0o4000))
                .with_context(|| format!("Failed to set SUID on {}", rel))?;
        }
    }

    // 2. Convenience symlinks
    println!("[*] Creating system symlinks...");
    for (target, link) in SYSTEM_SYMLINKS {
        create_relative_symlink(rootfs, target, link)?;
    }

    // 3. Derived databases, when the tools and data exist in the rootfs
    println!("[*] Updating system databases (Mime/Schemas)...");
    regenerate_database(
        rootfs,
        "usr/bin/glib-compile-schemas",
        "usr/share/glib-2.0/schemas",
    );
    regenerate_database(rootfs, "usr/bin/update-mime-database", "usr/share/mime");

    // 4. Live boot marker
    fs::write(rootfs.join(LIVE_MARKER), "1")?;

    Ok(())
}

/// Create `link` pointing at `target` (both rootfs-relative) with a relative
/// link value, skipping links that already resolve. The target must exist,
/// except `bin/bash` which may itself be a link created earlier in the pass.
fn create_relative_symlink(rootfs: &Path, target: &str, link: &str) -> Result<()> {
    let link_path = rootfs.join(link);
    if link_path.exists() {
        return Ok(());
    }
    let target_path = rootfs.join(target);
    if !target_path.exists() && target != "bin/bash" {
        return Ok(());
    }

    let link_dir = link_path.parent().context("Symlink has no parent")?;
    let rel_target = relative_path(link_dir, &target_path);
    println!("  Creating symlink: {} -> {}", link, rel_target.display());
    match std::os::unix::fs::symlink(&rel_target, &link_path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to create symlink {}", link)),
    }
}

/// Compute a relative path from `from_dir` to `to` (both absolute).
fn relative_path(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let to_parts: Vec<Component> = to.components().collect();

    let common = from
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part);
    }
    rel
}

/// Run a database-regeneration tool inside the rootfs if both the tool and
/// its data directory exist. Failures are ignored like the rest of the
/// desktop glue: a broken database surfaces in the integrity check instead.
fn regenerate_database(rootfs: &Path, tool: &str, data_dir: &str) {
    let tool_path = rootfs.join(tool);
    let data_path = rootfs.join(data_dir);
    if !tool_path.exists() || !data_path.exists() {
        return;
    }

    let _ = Cmd::new(tool_path.to_string_lossy())
        .arg_path(&data_path)
        .env(
            "LD_LIBRARY_PATH",
            rootfs.join("usr/lib64").to_string_lossy(),
        )
        .allow_fail()
        .run();
}

/// VERIFY_INTEGRITY: every critical path must exist, then the assembled
/// Python runtime must function standalone.
pub fn verify_integrity(config: &Config) -> Result<()> {
    println!("\n=== Verifying Rootfs Integrity ===");
    let rootfs = &config.rootfs_dir;

    let mut missing = Vec::new();
    for rel in CRITICAL_FILES {
        if !rootfs.join(rel).exists() {
            println!("  [MISSING] {}", rel);
            missing.push(*rel);
        }
    }
    if !missing.is_empty() {
        bail!(
            "Rootfs integrity check failed: {} critical files missing",
            missing.len()
        );
    }

    verify_python_runtime(rootfs)?;

    println!("[!] Rootfs integrity check PASSED.");
    Ok(())
}

/// Run the rootfs python3 with its environment pointed at the assembled
/// tree (never the host's) and confirm the stdlib is importable.
fn verify_python_runtime(rootfs: &Path) -> Result<()> {
    println!("[*] Verifying Python runtime...");

    let python = rootfs.join("usr/bin/python3");
    let lib_path = format!(
        "{}:{}",
        rootfs.join("usr/lib64").display(),
        rootfs.join("usr/lib").display()
    );

    let result = Cmd::new(python.to_string_lossy())
        .args(["-c", "import encodings; print('Python Encodings OK')"])
        .env("PYTHONHOME", rootfs.join("usr").to_string_lossy())
        .env("LD_LIBRARY_PATH", lib_path)
        .env_remove("PYTHONPATH")
        .allow_fail()
        .run()?;

    if !result.success() {
        bail!("Python runtime check failed:\n{}", result.stderr_trimmed());
    }
    println!("  [OK] Python runtime");
    Ok(())
}
