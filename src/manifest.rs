//! Package manifest store.
//!
//! The manifest maps each package name to the artifact paths its build is
//! expected to install. It is pure data: verification logic lives in
//! `verify`.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Mapping from package name to expected artifact paths.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: HashMap<String, Vec<String>>,
}

impl Manifest {
    /// Load the manifest from a JSON file.
    ///
    /// A missing file is not an error: verification is simply limited (no
    /// package will ever be considered built). A malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            println!("WARNING: Package manifests file not found. Verification will be limited.");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file {}", path.display()))?;
        let entries: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest file {}", path.display()))?;

        Ok(Self { entries })
    }

    /// Build a manifest directly from entries (used by tests).
    pub fn from_entries(entries: HashMap<String, Vec<String>>) -> Self {
        Self { entries }
    }

    /// Expected artifacts for a package, in manifest order.
    ///
    /// `None` means the package has no manifest entry and can never be
    /// considered built.
    pub fn artifacts(&self, package: &str) -> Option<&[String]> {
        self.entries.get(package).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
