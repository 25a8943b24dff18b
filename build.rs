//! Build script for uSDR firmware
//!
//! Makes the memory layout available to the linker for embedded
//! builds. The shared streaming state and the two ring buffers live at
//! fixed addresses both cores agree on, so memory.x matters.

fn main() {
    // Tell Cargo to re-run this if the linker script changes
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");

    // Link memory.x from project directory
    println!(
        "cargo:rustc-link-search={}",
        std::env::var("CARGO_MANIFEST_DIR").unwrap()
    );
}
