//! Rootfs compression, boot staging and ISO packaging.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::Path;

use crate::config::Config;
use crate::process::Cmd;

/// GRUB menu entry for the live system. Console parameters match what the
/// kernel is built for (serial + vga).
const GRUB_CONFIG: &str = r#"set timeout=3
set default=0

menuentry "GeminiOS Live" {
    linux /boot/kernel console=tty0 console=ttyS0,115200n8 earlyprintk=serial,ttyS0,115200
    initrd /boot/initramfs.cpio.lz4
}
"#;

/// COMPRESS_ROOTFS: squash the whole rootfs into `isodir/root.sfs`.
///
/// zstd strikes the ratio/decode-speed balance a live system wants; all
/// files are owned by root in the image regardless of who built them.
pub fn compress_rootfs(config: &Config) -> Result<()> {
    println!("[*] Creating root.sfs (SquashFS)...");

    let sfs_path = config.iso_dir.join("root.sfs");
    if sfs_path.exists() {
        fs::remove_file(&sfs_path)?;
    }
    fs::create_dir_all(&config.iso_dir)?;

    Cmd::new("mksquashfs")
        .arg_path(&config.rootfs_dir)
        .arg_path(&sfs_path)
        .args(["-comp", "zstd"])
        .arg("-noappend")
        .arg("-wildcards")
        .arg("-all-root")
        .error_msg("mksquashfs failed. Install squashfs-tools")
        .run_interactive()?;

    let metadata = fs::metadata(&sfs_path)?;
    println!("  root.sfs created: {} MB", metadata.len() / 1024 / 1024);
    Ok(())
}

/// STAGE_KERNEL: copy the kernel into the ISO boot directory.
///
/// Prefers the kernel already synced into the rootfs; falls back to the
/// configured prebuilt image. At this stage a missing kernel is fatal — an
/// ISO without one does not boot.
pub fn stage_kernel(config: &Config) -> Result<()> {
    println!("[*] Preparing kernel...");

    let dest = config.iso_dir.join("boot/kernel");
    fs::create_dir_all(dest.parent().expect("boot dir has a parent"))?;

    let rootfs_kernel = config.rootfs_dir.join("boot/kernel");
    let src = if rootfs_kernel.exists() {
        rootfs_kernel
    } else {
        config.kernel_image.clone()
    };

    if !src.exists() {
        bail!("Kernel not found at {}", src.display());
    }
    fs::copy(&src, &dest)
        .with_context(|| format!("Failed to copy kernel to {}", dest.display()))?;
    Ok(())
}

/// WRITE_BOOT_CONFIG: emit the GRUB configuration for the live entry.
pub fn write_boot_config(config: &Config) -> Result<()> {
    println!("[*] Generating GRUB config...");

    let grub_dir = config.iso_dir.join("boot/grub");
    fs::create_dir_all(&grub_dir)?;
    fs::write(grub_dir.join("grub.cfg"), GRUB_CONFIG)?;
    Ok(())
}

/// BUILD_ISO: run grub-mkrescue over the staged tree, then write a SHA-256
/// checksum next to the image.
pub fn build_iso(config: &Config) -> Result<()> {
    println!("[*] Building {}...", config.iso_output.display());

    Cmd::new("grub-mkrescue")
        .arg("-o")
        .arg_path(&config.iso_output)
        .arg_path(&config.iso_dir)
        .error_msg("grub-mkrescue failed. Install grub tools and xorriso")
        .run_interactive()?;

    if !config.iso_output.exists() {
        bail!("grub-mkrescue reported success but produced no ISO");
    }

    write_checksum(&config.iso_output)?;
    println!("[!] ISO built successfully: {}", config.iso_output.display());
    Ok(())
}

/// Write `<iso>.sha256` in the `sha256sum -c` format.
fn write_checksum(iso: &Path) -> Result<()> {
    let mut file = File::open(iso)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let digest = hasher.finalize();

    let file_name = iso
        .file_name()
        .context("ISO path has no file name")?
        .to_string_lossy();
    let checksum_path = iso.with_extension("iso.sha256");
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    fs::write(&checksum_path, format!("{}  {}\n", hex, file_name))?;
    Ok(())
}
