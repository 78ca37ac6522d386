//! Unit tests for parsing, verification and configuration logic.

mod helpers;

use std::collections::HashMap;
use std::fs;

use gemiso::archive::ControlMetadata;
use gemiso::config::Config;
use gemiso::libdeps;
use gemiso::manifest::Manifest;
use gemiso::packages;
use gemiso::timing::Timer;
use gemiso::verify;
use helpers::*;

// --- ldd output parsing ---

#[test]
fn test_parse_ldd_standard_output() {
    let output = "\
\tlinux-vdso.so.1 (0x00007ffee9bfe000)
\tlibc.so.6 => /lib64/libc.so.6 (0x00007f1234000000)
\tlibtinfo.so.6 => /usr/lib64/libtinfo.so.6 (0x00007f1234200000)
\t/lib64/ld-linux-x86-64.so.2 (0x00007f1234500000)
";
    let names = libdeps::parse_ldd_output(output).unwrap();
    assert_eq!(
        names,
        vec!["libc.so.6", "libtinfo.so.6", "ld-linux-x86-64.so.2"]
    );
}

#[test]
fn test_parse_ldd_skips_vdso() {
    let output = "\tlinux-vdso.so.1 (0x00007ffee9bfe000)\n";
    let names = libdeps::parse_ldd_output(output).unwrap();
    assert!(names.is_empty());
}

#[test]
fn test_parse_ldd_keeps_not_found_entries() {
    let output = "\tlibmissing.so.1 => not found\n";
    let names = libdeps::parse_ldd_output(output).unwrap();
    assert_eq!(names, vec!["libmissing.so.1"]);
}

#[test]
fn test_parse_ldd_static_binary() {
    let output = "\tstatically linked\n";
    let names = libdeps::parse_ldd_output(output).unwrap();
    assert!(names.is_empty());
}

#[test]
fn test_parse_ldd_empty_output() {
    let names = libdeps::parse_ldd_output("").unwrap();
    assert!(names.is_empty());
}

// --- artifact resolution and verification ---

#[test]
fn test_resolve_absolute_specifier_targets_rootfs() {
    let env = TestEnv::new();
    let resolved = verify::resolve_artifact(&env.config, "/usr/bin/gcc");
    assert_eq!(resolved, env.config.rootfs_dir.join("usr/bin/gcc"));
}

#[test]
fn test_resolve_relative_prefers_rootfs_when_present() {
    let env = TestEnv::new();
    write_file(&env.config.rootfs_dir.join("usr/lib/libfoo.so"), "");
    let resolved = verify::resolve_artifact(&env.config, "usr/lib/libfoo.so");
    assert_eq!(resolved, env.config.rootfs_dir.join("usr/lib/libfoo.so"));
}

#[test]
fn test_resolve_relative_falls_back_to_project_root() {
    let env = TestEnv::new();
    let resolved = verify::resolve_artifact(&env.config, "external_dependencies/tool/bin/tool");
    assert_eq!(
        resolved,
        env.root.join("external_dependencies/tool/bin/tool")
    );
}

#[test]
fn test_is_verified_requires_all_artifacts() {
    let env = TestEnv::new();
    let manifest = Manifest::from_entries(HashMap::from([(
        "mypkg".to_string(),
        vec!["/usr/bin/a".to_string(), "/usr/bin/b".to_string()],
    )]));

    write_file(&env.config.rootfs_dir.join("usr/bin/a"), "");
    assert!(!verify::is_verified(&manifest, &env.config, "mypkg"));

    write_file(&env.config.rootfs_dir.join("usr/bin/b"), "");
    assert!(verify::is_verified(&manifest, &env.config, "mypkg"));
}

#[test]
fn test_missing_artifacts_lists_only_absent_ones() {
    let env = TestEnv::new();
    let manifest = Manifest::from_entries(HashMap::from([(
        "mypkg".to_string(),
        vec!["/usr/bin/a".to_string(), "/usr/bin/b".to_string()],
    )]));
    write_file(&env.config.rootfs_dir.join("usr/bin/a"), "");

    let missing = verify::missing_artifacts(&manifest, &env.config, "mypkg");
    assert_eq!(missing, vec!["/usr/bin/b".to_string()]);
}

#[test]
fn test_package_without_manifest_entry_is_never_verified() {
    let env = TestEnv::new();
    let manifest = Manifest::from_entries(HashMap::new());
    assert!(!verify::is_verified(&manifest, &env.config, "mystery"));
    assert!(verify::missing_artifacts(&manifest, &env.config, "mystery").is_empty());
}

// --- manifest loading ---

#[test]
fn test_manifest_load_missing_file_is_empty() {
    let env = TestEnv::new();
    let manifest = Manifest::load(&env.config.manifest_file).unwrap();
    assert!(manifest.is_empty());
}

#[test]
fn test_manifest_load_valid_file() {
    let env = TestEnv::new();
    env.write_manifest(r#"{"glibc": ["/usr/lib64/libc.so.6"], "bash": []}"#);
    let manifest = Manifest::load(&env.config.manifest_file).unwrap();
    assert_eq!(manifest.len(), 2);
    assert_eq!(
        manifest.artifacts("glibc"),
        Some(&["/usr/lib64/libc.so.6".to_string()][..])
    );
    assert_eq!(manifest.artifacts("bash"), Some(&[][..]));
    assert_eq!(manifest.artifacts("nonexistent"), None);
}

#[test]
fn test_manifest_load_malformed_file_is_an_error() {
    let env = TestEnv::new();
    env.write_manifest("{ not json");
    assert!(Manifest::load(&env.config.manifest_file).is_err());
}

// --- configuration ---

#[test]
fn test_config_default_paths_live_under_root() {
    let env = TestEnv::new();
    assert_eq!(env.config.rootfs_dir, env.root.join("rootfs"));
    assert_eq!(env.config.staging_dir, env.root.join("staging"));
    assert_eq!(env.config.ports_dir, env.root.join("ports"));
    assert_eq!(
        env.config.manifest_file,
        env.root.join("build_system/package_manifests.json")
    );
    assert_eq!(env.config.iso_output, env.root.join("GeminiOS.iso"));
}

#[test]
fn test_config_env_file_overrides_defaults() {
    let env = TestEnv::new();
    fs::write(
        env.root.join(".env"),
        "# image settings\nISO_OUTPUT=\"custom.iso\"\nLIB_SEARCH_ORDER=usr/lib64:lib64\n",
    )
    .unwrap();

    let config = Config::load(&env.root);
    assert_eq!(config.iso_output, env.root.join("custom.iso"));
    assert_eq!(config.lib_search_order, vec!["usr/lib64", "lib64"]);
}

// --- package registry ---

#[test]
fn test_package_order_starts_with_bootstrap() {
    assert_eq!(packages::PACKAGE_ORDER[0], "kernel_headers");
    assert_eq!(packages::PACKAGE_ORDER[1], "glibc");
    assert!(packages::is_bootstrap("kernel_headers"));
    assert!(packages::is_bootstrap("glibc"));
    assert!(!packages::is_bootstrap("bash"));
}

#[test]
fn test_package_order_has_no_duplicates() {
    let mut seen = std::collections::HashSet::new();
    for name in packages::PACKAGE_ORDER {
        assert!(seen.insert(name), "duplicate package entry: {}", name);
    }
}

#[test]
fn test_known_packages() {
    assert!(packages::is_known("glibc"));
    assert!(packages::is_known("geminios_core"));
    assert!(!packages::is_known("no_such_package"));
}

// --- control metadata ---

#[test]
fn test_control_metadata_json_field_names() {
    let control = ControlMetadata::for_package("geminios_core");
    let value = serde_json::to_value(&control).unwrap();
    let obj = value.as_object().unwrap();
    for key in [
        "package",
        "version",
        "architecture",
        "maintainer",
        "description",
        "depends",
    ] {
        assert!(obj.contains_key(key), "control.json missing key {}", key);
    }
    assert_eq!(obj["package"], "geminios_core");
    assert_eq!(obj["architecture"], "x86_64");
}

#[test]
fn test_control_metadata_defaults_for_unlisted_package() {
    let control = ControlMetadata::for_package("bash");
    assert_eq!(control.version, "1.0");
    assert!(control.depends.is_empty());
}

// --- timing ---

#[test]
fn test_timer_returns_elapsed_duration() {
    let timer = Timer::start("phase");
    std::thread::sleep(std::time::Duration::from_millis(10));
    let elapsed = timer.finish();
    assert!(elapsed >= std::time::Duration::from_millis(10));
}
