//! gpkg package archive construction and staging-tree installs.
//!
//! Wire format (GPKG v2), bit-exact:
//!
//! ```text
//! package.gpkg            zstd stream
//!   -> outer tar
//!        -> control.json  UTF-8 JSON control metadata
//!        -> data.tar.zst  zstd stream
//!             -> inner tar: contents of the install root ("." entries)
//!        -> scripts/*     optional executable lifecycle hooks (postinst, ...)
//! ```
//!
//! Packing also syncs the install tree into the run-wide staging tree so
//! packages later in the sequence see this build's headers, libraries and
//! pkg-config data without touching the final rootfs.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::packages;

/// zstd level for both archive layers. Fast symmetric compress/decompress;
/// package installs decompress far more often than they compress.
const ZSTD_LEVEL: i32 = 3;

/// Control metadata serialized as `control.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMetadata {
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub maintainer: String,
    pub description: String,
    pub depends: Vec<String>,
}

impl ControlMetadata {
    /// Control metadata for a named package from the export table.
    pub fn for_package(name: &str) -> Self {
        let meta = packages::export_meta(name);
        Self {
            package: name.to_string(),
            version: meta.version.to_string(),
            architecture: "x86_64".to_string(),
            maintainer: "GeminiOS User".to_string(),
            description: meta.description.to_string(),
            depends: meta.depends.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Pack an install tree into a .gpkg archive at `output`.
///
/// `scripts_dir`, when given, contributes every regular file it contains as
/// a `scripts/<name>` lifecycle hook, permissions preserved.
pub fn pack(
    install_root: &Path,
    control: &ControlMetadata,
    scripts_dir: Option<&Path>,
    output: &Path,
) -> Result<()> {
    if !install_root.is_dir() {
        bail!(
            "Package install root {} does not exist",
            install_root.display()
        );
    }
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    // Inner layer: tar of the install tree, zstd-compressed, built in memory.
    let mut data_tar_zst = Vec::new();
    {
        let encoder = zstd::Encoder::new(&mut data_tar_zst, ZSTD_LEVEL)
            .context("Failed to start data.tar.zst encoder")?;
        let mut tar = tar::Builder::new(encoder);
        tar.follow_symlinks(false);
        tar.append_dir_all(".", install_root)
            .with_context(|| format!("Failed to tar install root {}", install_root.display()))?;
        let encoder = tar.into_inner()?;
        encoder.finish()?;
    }

    // Outer layer: control.json + data.tar.zst (+ scripts/), zstd-compressed.
    let out_file = File::create(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut encoder =
        zstd::Encoder::new(out_file, ZSTD_LEVEL).context("Failed to start gpkg encoder")?;
    {
        let mut tar = tar::Builder::new(&mut encoder);

        let control_json =
            serde_json::to_vec_pretty(control).context("Failed to serialize control.json")?;
        let mut header = tar::Header::new_gnu();
        header.set_size(control_json.len() as u64);
        header.set_mode(0o644);
        tar.append_data(&mut header, "control.json", control_json.as_slice())?;

        let mut header = tar::Header::new_gnu();
        header.set_size(data_tar_zst.len() as u64);
        header.set_mode(0o644);
        tar.append_data(&mut header, "data.tar.zst", data_tar_zst.as_slice())?;

        if let Some(scripts) = scripts_dir {
            for entry in fs::read_dir(scripts)
                .with_context(|| format!("Failed to read scripts dir {}", scripts.display()))?
            {
                let path = entry?.path();
                if path.is_file() {
                    let name = path.file_name().expect("script file name");
                    tar.append_path_with_name(&path, Path::new("scripts").join(name))?;
                }
            }
        }

        tar.finish()?;
    }
    encoder.finish()?.sync_all().ok();

    Ok(())
}

/// Unpack a .gpkg archive: payload tree into `data_dest`, lifecycle scripts
/// (if any) into `scripts_dest`. Returns the control metadata.
pub fn unpack(
    gpkg: &Path,
    data_dest: &Path,
    scripts_dest: Option<&Path>,
) -> Result<ControlMetadata> {
    let file =
        File::open(gpkg).with_context(|| format!("Failed to open {}", gpkg.display()))?;
    let decoder = zstd::Decoder::new(file).context("Failed to start gpkg decoder")?;
    let mut outer = tar::Archive::new(decoder);
    // Lifecycle scripts must stay executable.
    outer.set_preserve_permissions(true);

    let mut control: Option<ControlMetadata> = None;
    let mut data_tar_zst: Option<Vec<u8>> = None;

    for entry in outer.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.into_owned();

        if path == Path::new("control.json") {
            let mut buf = String::new();
            entry.read_to_string(&mut buf)?;
            control = Some(
                serde_json::from_str(&buf).context("Failed to parse control.json")?,
            );
        } else if path == Path::new("data.tar.zst") {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            data_tar_zst = Some(buf);
        } else if let Ok(script) = path.strip_prefix("scripts") {
            if let Some(dest) = scripts_dest {
                fs::create_dir_all(dest)?;
                entry.unpack(dest.join(script))?;
            }
        }
    }

    let control = control.context("gpkg has no control.json")?;
    let data_tar_zst = data_tar_zst.context("gpkg has no data.tar.zst")?;

    fs::create_dir_all(data_dest)?;
    let decoder =
        zstd::Decoder::new(data_tar_zst.as_slice()).context("Failed to start data decoder")?;
    let mut inner = tar::Archive::new(decoder);
    inner.set_preserve_permissions(true);
    inner
        .unpack(data_dest)
        .with_context(|| format!("Failed to unpack payload into {}", data_dest.display()))?;

    Ok(control)
}

/// Sync an install tree into the staging tree, additively.
///
/// Existing files are overwritten (later builds win), nothing is removed.
/// Stale libtool `.la` files are purged afterwards: they bake in absolute
/// paths that poison later configure runs, so leaving them behind is a
/// build-correctness bug.
pub fn sync_staging(staging: &Path, install_root: &Path) -> Result<()> {
    for entry in WalkDir::new(install_root) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(install_root)
            .expect("walkdir yields paths under its root");
        if rel.as_os_str().is_empty() {
            continue;
        }
        let dest = staging.join(rel);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&dest)?;
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            if dest.symlink_metadata().is_ok() {
                fs::remove_file(&dest)?;
            }
            std::os::unix::fs::symlink(&target, &dest).with_context(|| {
                format!("Failed to recreate symlink {}", dest.display())
            })?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest).with_context(|| {
                format!(
                    "Failed to copy {} into staging",
                    entry.path().display()
                )
            })?;
        }
    }

    purge_la_files(staging)?;
    Ok(())
}

/// Delete libtool `.la` files under a tree. Returns how many were removed.
pub fn purge_la_files(tree: &Path) -> Result<usize> {
    let mut removed = 0;
    if !tree.exists() {
        return Ok(0);
    }
    for entry in WalkDir::new(tree) {
        let entry = entry?;
        let is_la = entry
            .path()
            .extension()
            .and_then(std::ffi::OsStr::to_str)
            == Some("la");
        if entry.file_type().is_file() && is_la {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Export a package's install tree as `exports/<name>_<version>_<arch>.gpkg`
/// and sync it into the staging tree. Returns the archive path.
pub fn export_package(config: &Config, name: &str, install_root: &Path) -> Result<PathBuf> {
    let control = ControlMetadata::for_package(name);
    let archive_name = format!(
        "{}_{}_{}.gpkg",
        control.package, control.version, control.architecture
    );
    let output = config.export_dir.join(archive_name);

    let scripts_dir = install_root
        .parent()
        .map(|port| port.join("scripts"))
        .filter(|p| p.is_dir());

    pack(install_root, &control, scripts_dir.as_deref(), &output)
        .with_context(|| format!("Failed to package {}", name))?;
    sync_staging(&config.staging_dir, install_root)
        .with_context(|| format!("Failed to stage {}", name))?;

    Ok(output)
}
