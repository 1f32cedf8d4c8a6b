//! Build script for spotmood.
//!
//! Copies the `.env.example` template into the application's local data
//! directory, next to where `config::load_env` looks for the `.env` file.

use std::{env, fs, path::PathBuf};

/// Places `.env.example` in the local data directory.
///
/// Destination per platform:
/// - Linux: `~/.local/share/spotmood/.env.example`
/// - macOS: `~/Library/Application Support/spotmood/.env.example`
/// - Windows: `%LOCALAPPDATA%/spotmood/.env.example`
///
/// A missing template only produces a cargo warning. Failing to create the
/// directory or write the copy fails the build.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let template = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("spotmood");
    fs::create_dir_all(&out_dir)?;

    if template.is_file() {
        fs::copy(&template, out_dir.join(".env.example"))?;
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            template.display()
        );
    }

    Ok(())
}
