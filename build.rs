//! Embeds the build version into the `dotty` binary.
use std::process::Command;

fn main() {
    // DOTTY_VERSION wins (release builds); otherwise describe the checkout.
    if let Ok(version) = std::env::var("DOTTY_VERSION") {
        println!("cargo:rustc-env=DOTTY_VERSION={version}");
    } else if let Ok(output) = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        && output.status.success()
    {
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        println!("cargo:rustc-env=DOTTY_VERSION={version}");
    }

    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/");
    println!("cargo:rerun-if-env-changed=DOTTY_VERSION");
}
