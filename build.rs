fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let build_date = chrono::Utc::now().format("%Y-%m-%d").to_string();
    let version = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    println!("cargo:rustc-env=BUILD_DATE={build_date}");
    // Shown by `tigerbox --version`
    println!("cargo:rustc-env=TIGERBOX_LONG_VERSION={version} (built {build_date})");
}
