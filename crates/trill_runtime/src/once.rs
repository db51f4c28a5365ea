//! Process-wide one-shot initialization (§5, §6): `trill_once` runs its
//! initializer exactly once across every thread that calls it, and orders
//! every caller's subsequent accesses after the initializer's writes.
//!
//! This is not built on `std::sync::Once` because `pred` is caller-owned,
//! zero-initialized storage embedded in generated code (a static global),
//! not a `Once` the runtime controls the address of.

use std::sync::atomic::{AtomicU64, Ordering};

const UNINIT: u64 = 0;
const RUNNING: u64 = 1;
const DONE: u64 = 2;

/// Runs `init` exactly once for a given `pred` across however many threads
/// call `trill_once` with it, spinning until the winning thread's call to
/// `init` has completed (§5: "ordering subsequent accesses after the
/// initializer's writes").
#[no_mangle]
pub unsafe extern "C" fn trill_once(pred: *mut u64, init: extern "C" fn()) {
    let state = AtomicU64::from_ptr(pred);
    loop {
        match state.compare_exchange(UNINIT, RUNNING, Ordering::AcqRel, Ordering::Acquire) {
            Ok(_) => {
                init();
                state.store(DONE, Ordering::Release);
                return;
            }
            Err(DONE) => return,
            Err(_) => std::hint::spin_loop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    static CALLS: AtomicU32 = AtomicU32::new(0);
    extern "C" fn bump() {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn initializer_runs_once_across_repeated_calls() {
        let mut pred: u64 = 0;
        unsafe {
            trill_once(&mut pred as *mut u64, bump);
            trill_once(&mut pred as *mut u64, bump);
            trill_once(&mut pred as *mut u64, bump);
        }
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn distinct_predicates_each_run_their_own_initializer() {
        static OTHER_CALLS: AtomicU32 = AtomicU32::new(0);
        extern "C" fn other() {
            OTHER_CALLS.fetch_add(1, Ordering::SeqCst);
        }
        let mut pred: u64 = 0;
        unsafe {
            trill_once(&mut pred as *mut u64, other);
        }
        assert_eq!(OTHER_CALLS.load(Ordering::SeqCst), 1);
    }
}
