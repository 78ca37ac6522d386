//! Artifact-based build verification.
//!
//! A package counts as built iff every artifact in its manifest entry
//! resolves to an existing filesystem entry. Packages without a manifest
//! entry are never considered built: an unknown package always gets an
//! explicit build attempt rather than a silent skip.
//!
//! Exit codes are not trusted on their own; the orchestrator calls this
//! both before a build (to skip) and after (to confirm).

use std::path::PathBuf;

use crate::config::Config;
use crate::manifest::Manifest;

/// Resolve an artifact specifier to the path that is checked for existence.
///
/// Specifiers starting with `/` are rootfs-absolute. Anything else is tried
/// relative to the rootfs first, then relative to the project root.
pub fn resolve_artifact(config: &Config, artifact: &str) -> PathBuf {
    if let Some(stripped) = artifact.strip_prefix('/') {
        return config.rootfs_dir.join(stripped);
    }

    let in_rootfs = config.rootfs_dir.join(artifact);
    if in_rootfs.exists() {
        return in_rootfs;
    }
    config.root_dir.join(artifact)
}

/// Whether a package is verified built.
///
/// No side effects; safe to call before and after a build.
pub fn is_verified(manifest: &Manifest, config: &Config, package: &str) -> bool {
    match manifest.artifacts(package) {
        Some(artifacts) => artifacts
            .iter()
            .all(|a| resolve_artifact(config, a).exists()),
        // No manifest entry: conservatively not built.
        None => false,
    }
}

/// Manifest artifacts of a package that do not currently resolve.
///
/// Empty for a verified package. For a package without a manifest entry this
/// is also empty — callers distinguish that case via [`Manifest::artifacts`].
pub fn missing_artifacts(manifest: &Manifest, config: &Config, package: &str) -> Vec<String> {
    manifest
        .artifacts(package)
        .map(|artifacts| {
            artifacts
                .iter()
                .filter(|a| !resolve_artifact(config, a).exists())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}
