use std::env;
use std::process::Command;
use time::OffsetDateTime;

fn main() {
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");

    let build_date = env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.parse::<i64>().ok())
        .and_then(|epoch| OffsetDateTime::from_unix_timestamp(epoch).ok())
        .unwrap_or_else(OffsetDateTime::now_utc)
        .date();

    println!("cargo:rustc-env=APP_BUILD_DATE={build_date}");
    println!("cargo:rerun-if-env-changed=CARGO_PKG_VERSION");

    let package_version = env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    // Release builds skip the git probe
    let profile = env::var("PROFILE").unwrap_or_default();
    let display_version = if profile == "release" {
        package_version.clone()
    } else {
        println!("cargo:rerun-if-changed=.git/HEAD");
        println!("cargo:rerun-if-changed=.git/refs/tags");

        let short_rev = Command::new("git")
            .args(["rev-parse", "--short", "HEAD"])
            .output()
            .ok()
            .filter(|output| output.status.success())
            .and_then(|output| String::from_utf8(output.stdout).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        match short_rev {
            Some(rev) => format!("{package_version}-dev+{rev}"),
            None => format!("{package_version}-dev"),
        }
    };

    println!("cargo:rustc-env=APP_VERSION_DISPLAY={display_version}");
}
