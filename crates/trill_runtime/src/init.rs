//! Process-lifetime initialization (§9: "Global mutable state in the
//! runtime... model as explicit process-lifetime initialization invoked
//! from the program entry point; forbid library users from calling
//! `trill_init` twice").
//!
//! Generated `main` calls this once before any other runtime entry point
//! runs. There is currently nothing to initialize beyond the guard itself
//! — no signal handlers are installed — but the guard exists so a future
//! addition has somewhere to go without every caller needing to change.

use std::sync::atomic::{AtomicBool, Ordering};

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Marks the runtime as initialized for this process. Fatal if called more
/// than once.
#[no_mangle]
pub extern "C" fn trill_init() {
    if INITIALIZED.swap(true, Ordering::AcqRel) {
        crate::error::fatal("trill_init called twice");
    }
}
