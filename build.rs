use std::process::Command;

fn main() {
    // Expose the short commit hash as a build identifier when building from a
    // git checkout; stays empty otherwise.
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();

    println!("cargo:rustc-env=GPZ_GIT_HASH={hash}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
