// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=EDGE_VIEWER_VERSION");

    // Packagers can pin the version string
    let version = std::env::var("EDGE_VIEWER_VERSION").unwrap_or_else(|_| describe_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Crate version, suffixed with the commit when built from a git checkout.
///
/// `0.1.0` on a clean tagged commit, `0.1.0+abcdef1` otherwise.
fn describe_version() -> String {
    let crate_version = env!("CARGO_PKG_VERSION");

    let on_tag = git(&["describe", "--tags", "--exact-match", "--match", "v*"])
        .is_some_and(|tag| tag.trim_start_matches('v') == crate_version);

    match git(&["rev-parse", "--short", "HEAD"]) {
        Some(hash) if !on_tag => format!("{}+{}", crate_version, hash),
        _ => crate_version.to_string(),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
