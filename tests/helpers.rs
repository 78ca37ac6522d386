//! Shared test utilities for gemiso tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use gemiso::config::Config;

/// Test environment simulating a project root: build_system scripts,
/// ports, rootfs and a config pointing at all of them.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Simulated project root
    pub root: PathBuf,
    /// Configuration over the temporary root
    pub config: Config,
}

impl TestEnv {
    /// Create a new test environment with a stub build_system.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();

        let build_system = root.join("build_system");
        fs::create_dir_all(&build_system).expect("Failed to create build_system");
        fs::write(
            build_system.join("env_config.sh"),
            "export GEMISO_ENV_OK=1\n",
        )
        .expect("Failed to write env_config.sh");
        fs::write(
            build_system.join("target_env.sh"),
            "export GEMISO_TARGET_OK=1\n",
        )
        .expect("Failed to write target_env.sh");

        fs::create_dir_all(root.join("rootfs")).expect("Failed to create rootfs");
        fs::create_dir_all(root.join("ports")).expect("Failed to create ports");

        let config = Config::load(&root);
        Self {
            _temp_dir: temp_dir,
            root,
            config,
        }
    }

    /// Write the package manifest file.
    pub fn write_manifest(&self, json: &str) {
        fs::write(&self.config.manifest_file, json).expect("Failed to write manifest");
    }

    /// Create a port with a build script. The script is sourced with the
    /// port directory as cwd, so `../../rootfs` reaches the rootfs.
    pub fn create_port(&self, name: &str, script: &str) -> PathBuf {
        let port_dir = self.config.ports_dir.join(name);
        fs::create_dir_all(&port_dir).expect("Failed to create port dir");
        fs::write(port_dir.join("build.sh"), script).expect("Failed to write build.sh");
        port_dir
    }
}

/// Create a file (and its parent directories) with the given content.
pub fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dirs");
    }
    fs::write(path, content).expect("Failed to write file");
}

/// Create an executable file with the given content.
pub fn write_executable(path: &Path, content: &str) {
    write_file(path, content);
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))
        .expect("Failed to set permissions");
}

/// Assert that a path exists.
pub fn assert_exists(path: &Path) {
    assert!(path.exists(), "Expected {} to exist", path.display());
}

/// Assert that a path is a symlink pointing at the given target.
pub fn assert_symlink(path: &Path, target: &str) {
    assert!(
        path.is_symlink(),
        "Expected {} to be a symlink",
        path.display()
    );
    let actual = fs::read_link(path).expect("Failed to read symlink");
    assert_eq!(
        actual,
        PathBuf::from(target),
        "Symlink {} points at {}, expected {}",
        path.display(),
        actual.display(),
        target
    );
}
