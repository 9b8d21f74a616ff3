//! Process-wide shutdown state.
//!
//! Ctrl+C cancels the root [`Context`]; every build context derives from it,
//! so in-flight jobs drain and the process exits with the collected errors.
//! A second Ctrl+C exits immediately.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use super::Context;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

static ROOT: OnceLock<Context> = OnceLock::new();

/// The context all builds in this process derive from.
pub fn root_context() -> Context {
    ROOT.get_or_init(Context::background).clone()
}

/// Install the Ctrl+C handler. Call once at program start.
pub fn setup_shutdown_handler() -> anyhow::Result<()> {
    let root = root_context();
    ctrlc::set_handler(move || {
        if SHUTDOWN.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        crate::log!("build"; "shutting down...");
        root.cancel();
    })
    .map_err(|e| anyhow::anyhow!("failed to set Ctrl+C handler: {}", e))
}

/// Relaxed: a late observer only processes a few more items.
pub fn is_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}
