// Build script for the metronome core
//
// flutter_rust_bridge v2 code generation is run via the CLI tool:
//   flutter_rust_bridge_codegen generate

fn main() {
    // Tell cargo to rerun this build script if api.rs changes
    println!("cargo:rerun-if-changed=src/api.rs");

    // Android builds link against libc++_shared so the oboe host used by cpal
    // resolves symbols like __cxa_pure_virtual on all ABIs (arm/x86).
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("android") {
        println!("cargo:rustc-link-lib=c++_shared");
    }
}
