// Metronome Core - Rust timing engine
// Lookahead pulse scheduling against an audio clock, with a timer fallback

// Module declarations
pub mod api;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod scheduler;

// Re-exports for convenience
pub use api::*;

use log::info;

/// Install the global tracing subscriber; `log` records are bridged into it.
///
/// Safe to call more than once: later calls are ignored.
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_os = "android")] {
            use tracing_subscriber::layer::SubscriberExt;
            use tracing_subscriber::util::SubscriberInitExt;

            match tracing_android::layer("MetronomeCore") {
                Ok(layer) => {
                    let _ = tracing_subscriber::registry().with(layer).try_init();
                }
                Err(err) => eprintln!("Failed to create Android log layer: {}", err),
            }
        } else {
            let _ = tracing_subscriber::fmt()
                .with_max_level(tracing::Level::DEBUG)
                .with_target(false)
                .try_init();
        }
    }
}

/// JNI_OnLoad is called when the native library is loaded by Android
/// This function initializes the Android context required by the audio host
#[cfg(target_os = "android")]
#[no_mangle]
pub extern "system" fn JNI_OnLoad(vm: jni::JavaVM, _reserved: *mut std::ffi::c_void) -> jni::sys::jint {
    init_logging();

    info!("JNI_OnLoad called - initializing Android context");

    // SAFETY: the JavaVM pointer is provided by the Android runtime and
    // outlives the process; no Activity context is available at load time.
    unsafe {
        ndk_context::initialize_android_context(
            vm.get_java_vm_pointer().cast(),
            std::ptr::null_mut(),
        );
    }

    info!("Android context initialized successfully");

    jni::sys::JNI_VERSION_1_6
}

/// Log the crate version once the host has loaded the library.
pub fn log_startup_banner() {
    info!("Metronome core v{} loaded", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
    }
}
