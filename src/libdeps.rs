//! Shared-library dependency-closure resolution.
//!
//! Uses `ldd` to introspect a binary's dynamic dependencies, then resolves
//! each reported name inside the target rootfs rather than trusting host
//! paths — the binary being inspected was built against the rootfs, not the
//! host. ldd already reports the flattened transitive set, so resolution is
//! single-hop.
//!
//! Copies always dereference symlink chains to the real file and recreate
//! an equivalent symlink at the requested name, so both link-time and
//! runtime names stay satisfiable in the destination.

use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Dynamic loader name; checked explicitly because some binaries reference
/// it only via PT_INTERP, which ldd does not always list.
pub const DYNAMIC_LOADER: &str = "ld-linux-x86-64.so.2";

/// Canonical library directory inside a destination tree.
const DEST_LIB_DIR: &str = "lib64";

/// Extract required shared-object names from a binary using ldd.
///
/// A statically linked (or non-ELF) input makes ldd fail; that is an empty
/// dependency list, not an error.
pub fn get_library_dependencies(binary_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("ldd")
        .arg(binary_path)
        .output()
        .context("Failed to run ldd - is glibc installed?")?;

    if !output.status.success() {
        return Ok(Vec::new());
    }

    parse_ldd_output(&String::from_utf8_lossy(&output.stdout))
}

/// Parse ldd output into required shared-object names.
///
/// Example ldd output:
/// ```text
///     linux-vdso.so.1 (0x00007ffee9bfe000)
///     libc.so.6 => /lib64/libc.so.6 (0x00007f1234000000)
///     libmissing.so.1 => not found
///     /lib64/ld-linux-x86-64.so.2 (0x00007f1234500000)
/// ```
///
/// Returns bare names (`libc.so.6`, `ld-linux-x86-64.so.2`). Virtual
/// kernel-provided entries (vdso) are dropped: they are never backed by a
/// real file. "not found" entries keep their name — the library may well
/// exist inside the rootfs even when the host lacks it.
pub fn parse_ldd_output(output: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.contains("vdso") {
            continue;
        }

        let name = if let Some((requested, _resolved)) = line.split_once("=>") {
            // "libc.so.6 => /lib64/libc.so.6 (0x...)" or "libfoo => not found"
            requested.trim().to_string()
        } else if line.starts_with('/') {
            // "/lib64/ld-linux-x86-64.so.2 (0x...)"
            let path = line.split_whitespace().next().unwrap_or(line);
            match Path::new(path).file_name() {
                Some(name) => name.to_string_lossy().into_owned(),
                None => continue,
            }
        } else {
            // "statically linked", "not a dynamic executable", etc.
            continue;
        };

        if !name.is_empty() {
            names.push(name);
        }
    }

    Ok(names)
}

/// Find a library by name in the rootfs, honoring the candidate-directory
/// priority order. The first candidate that resolves to a real file wins;
/// a broken symlink is skipped so it cannot shadow a later directory.
pub fn find_library(source_root: &Path, search_order: &[String], name: &str) -> Option<PathBuf> {
    search_order
        .iter()
        .map(|dir| source_root.join(dir).join(name))
        .find(|p| fs::canonicalize(p).is_ok())
}

/// Copy one library from the rootfs into `dest_root`'s canonical lib dir.
///
/// The match is dereferenced to its real file, which is what gets copied;
/// when the match was a symlink, an equivalent symlink (pointing at the real
/// file's basename) is recreated alongside. Returns false if the name is
/// not present in any candidate directory or its symlink chain is broken.
pub fn copy_library(
    source_root: &Path,
    search_order: &[String],
    name: &str,
    dest_root: &Path,
) -> Result<bool> {
    let Some(found) = find_library(source_root, search_order, name) else {
        return Ok(false);
    };
    let Ok(real) = fs::canonicalize(&found) else {
        // Symlink to nowhere; treat as unresolved rather than aborting.
        return Ok(false);
    };

    let lib_dir = dest_root.join(DEST_LIB_DIR);
    fs::create_dir_all(&lib_dir)?;

    let real_name = real.file_name().context("Library path has no file name")?;
    fs::copy(&real, lib_dir.join(real_name))
        .with_context(|| format!("Failed to copy {}", real.display()))?;

    if real_name != OsStr::new(name) {
        let link = lib_dir.join(name);
        if link.symlink_metadata().is_ok() {
            fs::remove_file(&link)?;
        }
        std::os::unix::fs::symlink(real_name, &link)
            .with_context(|| format!("Failed to recreate symlink {}", link.display()))?;
    }

    Ok(true)
}

/// Resolve a binary's full shared-library closure and copy it into
/// `dest_root/lib64`, including the dynamic loader.
///
/// Unresolvable names are non-fatal: each produces a warning naming the
/// binary and the library, and is returned for the caller's records. Live
/// image binaries routinely carry references that are never exercised at
/// boot, so a hard failure here would be wrong.
pub fn copy_with_libs(
    binary_path: &Path,
    dest_root: &Path,
    source_root: &Path,
    search_order: &[String],
) -> Result<Vec<String>> {
    let deps = get_library_dependencies(binary_path)?;
    let mut unresolved = Vec::new();

    for name in deps {
        if !copy_library(source_root, search_order, &name, dest_root)? {
            println!(
                "WARNING: Could not find library {} in rootfs for {}",
                name,
                binary_path.display()
            );
            unresolved.push(name);
        }
    }

    // The loader must exist at its canonical name or nothing dynamic runs.
    let loader_dest = dest_root.join(DEST_LIB_DIR).join(DYNAMIC_LOADER);
    if !loader_dest.exists() {
        copy_library(source_root, search_order, DYNAMIC_LOADER, dest_root)?;
    }

    Ok(unresolved)
}
