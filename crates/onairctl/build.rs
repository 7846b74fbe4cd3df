// Build script for onairctl - embeds version at compile time

fn main() {
    // Release builds may override the version through the environment
    let version =
        std::env::var("ONAIR_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=ONAIR_VERSION={}", version);
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-env-changed=ONAIR_VERSION");
}
