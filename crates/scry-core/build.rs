//! Build script for scry-core
//!
//! Checks system requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Target operating system (live-process and kernel backings read `/proc`)
//!
//! ## Requirements
//!
//! - **Rust**: Edition 2021 (Rust 1.56.0 or newer)
//! - **Linux**: any kernel with `/proc` (live targets); core dumps work
//!   anywhere

fn main()
{
    // Check minimum Rust version
    // Edition 2021 requires Rust 1.56.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::parse("1.56.0").unwrap();

        if rustc_version < min_rust_version {
            panic!(
                "scry-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // Core-dump inspection is portable; the live-process and kernel backings
    // are Linux-only. Building elsewhere is allowed but those paths will
    // fail at runtime.
    #[cfg(not(target_os = "linux"))]
    println!("cargo:warning=live-process and kernel targets require Linux /proc");
}
