//! Build script for the yubca binary
//!
//! Sets YUBCA_REVISION to the short git revision, or `dev` outside a checkout.
//! A YUBCA_REVISION already in the environment wins.

use std::process::Command;

fn main() {
    let revision = std::env::var("YUBCA_REVISION")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(git_revision)
        .unwrap_or_else(|| "dev".to_string());

    println!("cargo::rerun-if-changed=build.rs");
    println!("cargo::rerun-if-env-changed=YUBCA_REVISION");
    println!("cargo::rustc-env=YUBCA_REVISION={}", revision);
}

fn git_revision() -> Option<String> {
    Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
