//! gemiso - GeminiOS ports builder and Live-CD ISO assembler.
//!
//! Builds the GeminiOS root filesystem from ~150 ordered source packages,
//! verifying each against a declarative artifact manifest, exporting build
//! outputs as gpkg archives, and assembling a bootable Live-CD:
//!
//! - **Verification** - a package counts as built iff its manifest
//!   artifacts exist; exit codes are never trusted alone
//! - **gpkg** - two-level zstd/tar package archive format
//! - **Dependency closure** - ldd-driven shared-library resolution for a
//!   self-contained minimal initramfs
//! - **Assembly pipeline** - rootfs -> squashfs -> initramfs -> ISO,
//!   sequential and fail-fast

pub mod archive;
pub mod assemble;
pub mod clean;
pub mod config;
pub mod initramfs;
pub mod iso;
pub mod libdeps;
pub mod manifest;
pub mod orchestrator;
pub mod packages;
pub mod process;
pub mod rootfs;
pub mod timing;
pub mod verify;
