//! Minimal initramfs builder (Live CD bootloader).
//!
//! Builds a tiny secondary filesystem carrying only a shell, mount tools
//! and switch_root — plus the resolved shared-library closure of each, so
//! the tree is self-contained. The embedded /init script locates the boot
//! medium, composes the squashfs + tmpfs overlay and hands control to the
//! real init.
//!
//! # Boot Flow
//!
//! ```text
//! 1. GRUB loads kernel + this initramfs
//! 2. Kernel extracts initramfs, runs /init
//! 3. /init (bash script):
//!    a. Mount /dev, /proc, /sys, /run
//!    b. Scan /dev/sr*, /dev/sd* for a medium containing root.sfs
//!    c. Mount root.sfs (squashfs, loop, read-only)
//!    d. Overlay: squashfs (lower) + tmpfs (upper)
//!    e. Move virtual mounts, switch_root to the overlay
//! 4. /bin/init (PID 1) takes over
//! ```

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use walkdir::WalkDir;

use crate::config::Config;
use crate::libdeps;

/// Directory structure of the initramfs work tree.
const INITRAMFS_DIRS: &[&str] = &[
    "bin", "sbin", "lib64", "mnt", "dev", "proc", "sys", "run", "usr/bin", "usr/sbin",
];

/// Essential tools and where each may live inside the rootfs, in preference
/// order. All land in the initramfs /bin under their tool name.
const ESSENTIAL_TOOLS: &[(&str, &[&str])] = &[
    ("bash", &["bin/bash", "usr/bin/bash"]),
    ("sh", &["bin/sh", "usr/bin/sh"]),
    ("mount", &["usr/bin/mount", "bin/mount", "bin/apps/system/mount"]),
    ("ls", &["usr/bin/ls", "bin/ls", "bin/apps/system/ls"]),
    ("mkdir", &["usr/bin/mkdir", "bin/mkdir", "bin/apps/system/mkdir"]),
    ("cat", &["usr/bin/cat", "bin/cat", "bin/apps/system/cat"]),
    ("sleep", &["usr/bin/sleep", "bin/sleep", "bin/apps/system/sleep"]),
    ("umount", &["usr/bin/umount", "bin/umount", "bin/apps/system/umount"]),
];

/// Boot-time script. Dropping to an interactive shell when no boot medium is
/// found is deliberate: a live CD console beats a kernel panic for recovery.
const INIT_SCRIPT: &str = r#"#!/bin/bash
export PATH=/bin:/usr/bin:/sbin:/usr/sbin

mount -t devtmpfs devtmpfs /dev
mount -t proc proc /proc
mount -t sysfs sysfs /sys
mount -t tmpfs tmpfs /run

echo "GeminiOS: Searching for boot media..."

# Find CDROM containing root.sfs
CDROM_DEV=""
sleep 2

for dev in /dev/sr* /dev/sd*; do
    [ -e "$dev" ] || continue
    echo "Checking device $dev..."
    mkdir -p /mnt/cdrom
    if mount -t iso9660 -o ro "$dev" /mnt/cdrom; then
        if [ -f "/mnt/cdrom/root.sfs" ]; then
            CDROM_DEV="$dev"
            echo "Found boot media at $dev"
            break
        fi
        echo "Device $dev does not contain root.sfs, unmounting."
        umount /mnt/cdrom
    else
        echo "Failed to mount $dev as iso9660."
    fi
done

if [ -z "$CDROM_DEV" ]; then
    echo "FATAL: Could not find boot media (root.sfs)!"
    echo "Available devices:"
    ls -d /dev/sd* /dev/sr*
    exec /bin/bash
fi

# Set up OverlayFS
echo "Setting up OverlayFS..."
mkdir -p /mnt/ro
mkdir -p /mnt/rw

# Mount SquashFS
mount -t squashfs -o loop /mnt/cdrom/root.sfs /mnt/ro

# Mount TmpFS for writes
mount -t tmpfs tmpfs /mnt/rw

# Create overlay directories
mkdir -p /mnt/rw/upper
mkdir -p /mnt/rw/work
mkdir -p /new_root

# Mount Overlay
mount -t overlay overlay -o lowerdir=/mnt/ro,upperdir=/mnt/rw/upper,workdir=/mnt/rw/work /new_root

# Move virtual filesystems
mount --move /dev /new_root/dev
mount --move /proc /new_root/proc
mount --move /sys /new_root/sys
mount --move /run /new_root/run

# Unmount boot media to allow switch_root to clean up
umount /mnt/cdrom

# Switch root
echo "Switching to real root..."
exec switch_root /new_root /bin/init
"#;

/// Build the minimal initramfs and pack it for early boot loading.
///
/// Returns the path of the packed archive (`isodir/boot/initramfs.cpio.lz4`).
pub fn build_initramfs(config: &Config) -> Result<PathBuf> {
    println!("\n=== Building Minimal Initramfs (Live CD Bootloader) ===");

    let work_dir = &config.initramfs_build_dir;
    if work_dir.exists() {
        fs::remove_dir_all(work_dir)?;
    }
    create_structure(work_dir)?;

    copy_essential_binaries(config, work_dir)?;
    write_init_script(work_dir)?;

    println!("[*] Compressing minimal initramfs...");
    let output = config.iso_dir.join("boot/initramfs.cpio.lz4");
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    pack_cpio_lz4(work_dir, &output)?;

    Ok(output)
}

fn create_structure(work_dir: &Path) -> Result<()> {
    for dir in INITRAMFS_DIRS {
        fs::create_dir_all(work_dir.join(dir))?;
    }
    // lib is an alias of lib64, same as the rootfs layout
    let lib = work_dir.join("lib");
    if !lib.exists() {
        std::os::unix::fs::symlink("lib64", &lib)?;
    }
    Ok(())
}

/// Locate each essential tool in the rootfs, copy its real file and its
/// library closure into the work tree.
fn copy_essential_binaries(config: &Config, work_dir: &Path) -> Result<()> {
    let rootfs = &config.rootfs_dir;
    let mut binaries: Vec<(PathBuf, &str)> = Vec::new();

    for (tool, candidates) in ESSENTIAL_TOOLS {
        match candidates.iter().find(|rel| rootfs.join(rel).exists()) {
            Some(rel) => binaries.push((PathBuf::from(rel), "bin")),
            None => println!("WARNING: Essential tool {} not found in rootfs!", tool),
        }
    }

    // switch_root lives in sbin; keep its directory in the initramfs
    if rootfs.join("sbin/switch_root").exists() {
        binaries.push((PathBuf::from("sbin/switch_root"), "sbin"));
    } else if rootfs.join("usr/sbin/switch_root").exists() {
        binaries.push((PathBuf::from("usr/sbin/switch_root"), "usr/sbin"));
    } else {
        println!("WARNING: switch_root not found in rootfs!");
    }

    for (src_rel, dest_dir) in binaries {
        let src = rootfs.join(&src_rel);

        // Resolve to the real file; a dangling symlink in a minimal tree is
        // an unbootable image.
        let real_src = fs::canonicalize(&src)
            .with_context(|| format!("Failed to resolve {}", src.display()))?;

        let file_name = src_rel.file_name().context("Binary path has no file name")?;
        let dest = work_dir.join(dest_dir).join(file_name);
        fs::copy(&real_src, &dest)
            .with_context(|| format!("Failed to copy {}", real_src.display()))?;
        fs::set_permissions(&dest, fs::Permissions::from_mode(0o755))?;

        libdeps::copy_with_libs(&real_src, work_dir, rootfs, &config.lib_search_order)?;
    }

    Ok(())
}

fn write_init_script(work_dir: &Path) -> Result<()> {
    let init_path = work_dir.join("init");
    fs::write(&init_path, INIT_SCRIPT)?;
    fs::set_permissions(&init_path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Pack the work tree as a newc cpio archive piped through lz4.
///
/// Both children are spawned directly with the file list fed over stdin —
/// no shell pipeline is composed.
fn pack_cpio_lz4(work_dir: &Path, output: &Path) -> Result<()> {
    let out_file = fs::File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let mut lz4 = Command::new("lz4")
        .args(["-l", "-T0"])
        .stdin(Stdio::piped())
        .stdout(Stdio::from(out_file))
        .spawn()
        .context("Failed to spawn lz4. Is it installed?")?;
    let lz4_stdin = lz4.stdin.take().expect("lz4 stdin is piped");

    let mut cpio = Command::new("cpio")
        .args(["--null", "-o", "--format=newc"])
        .current_dir(work_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::from(lz4_stdin))
        .spawn()
        .context("Failed to spawn cpio. Is it installed?")?;

    {
        let mut stdin = cpio.stdin.take().expect("cpio stdin is piped");
        for path in file_list(work_dir)? {
            stdin.write_all(path.as_bytes())?;
            stdin.write_all(&[0])?;
        }
    }

    let cpio_status = cpio.wait()?;
    let lz4_status = lz4.wait()?;
    if !cpio_status.success() {
        bail!("cpio failed (exit code {})", cpio_status.code().unwrap_or(-1));
    }
    if !lz4_status.success() {
        bail!("lz4 failed (exit code {})", lz4_status.code().unwrap_or(-1));
    }

    Ok(())
}

/// Every entry of the work tree as `./relative` paths, the way `find .`
/// would list them, directories before their contents.
fn file_list(work_dir: &Path) -> Result<Vec<String>> {
    let mut paths = vec![".".to_string()];
    for entry in WalkDir::new(work_dir).min_depth(1) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(work_dir)
            .expect("under walk root");
        paths.push(format!("./{}", rel.display()));
    }
    Ok(paths)
}
