//! gemiso - GeminiOS ports builder and Live-CD ISO assembler.

use anyhow::{bail, Result};
use clap::Parser;
use std::env;

use gemiso::assemble;
use gemiso::clean;
use gemiso::config::Config;
use gemiso::manifest::Manifest;
use gemiso::packages;

#[derive(Parser)]
#[command(name = "gemiso")]
#[command(about = "GeminiOS ports builder and Live-CD ISO assembler")]
#[command(
    after_help = "EXAMPLES:\n  gemiso                   Build all packages, then the ISO\n  gemiso bash coreutils    Build specific packages, then the ISO\n  gemiso bash --force      Force rebuild of bash\n  gemiso --clean           Remove all generated build state"
)]
struct Cli {
    /// Packages to build (default: the full build sequence)
    packages: Vec<String>,

    /// Force rebuild, ignoring manifest verification
    #[arg(long)]
    force: bool,

    /// Enable verbose build logging (ENABLE_DEBUG for build scripts)
    #[arg(long)]
    debug: bool,

    /// Remove all generated build state and exit
    #[arg(long)]
    clean: bool,

    /// Build packages only, skip image assembly
    #[arg(long)]
    skip_image: bool,

    /// Print the effective configuration before building
    #[arg(long)]
    show_config: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let root_dir = env::current_dir()?;
    let config = Config::load(&root_dir);

    if cli.show_config {
        config.print();
    }

    if cli.clean {
        return clean::clean_all(&config);
    }

    let manifest = Manifest::load(&config.manifest_file)?;

    let selection: Vec<&str> = if cli.packages.is_empty() {
        packages::PACKAGE_ORDER.to_vec()
    } else {
        let mut selected = Vec::new();
        for name in &cli.packages {
            if packages::is_known(name) {
                selected.push(name.as_str());
            } else {
                println!("WARNING: Package '{}' not found in the build sequence.", name);
            }
        }
        if selected.is_empty() {
            bail!("No valid packages specified to build");
        }
        selected
    };

    assemble::run(
        &config,
        &manifest,
        &selection,
        cli.force,
        cli.debug,
        cli.skip_image,
    )?;

    println!("\n[!] Build completed successfully!");
    println!(
        "\nRun: qemu-system-x86_64 -cdrom {} -m 2G -serial stdio -smp 2 -vga std -enable-kvm",
        config.iso_output.display()
    );
    println!("Remove the -enable-kvm flag if your host does not support it.");
    Ok(())
}
