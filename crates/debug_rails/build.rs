// Build script for debug_rails - embeds the compiler version at compile time

use std::process::Command;

fn main() {
    // Cargo hands build scripts the compiler it will use
    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());

    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "rustc unknown".to_string());

    // Embed as environment variable for runtime access
    println!("cargo:rustc-env=DEBUG_RAILS_RUSTC_VERSION={}", version);

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=RUSTC");
}
