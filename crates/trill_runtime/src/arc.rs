//! Reference counting for `indirect type` values (§4.8, §5, §6).
//!
//! Box state forms a two-state machine, `Live(n)` for `n >= 1` and `Dead`:
//! `retain` is `Live(n) -> Live(n+1)`, `release` is `Live(n>1) -> Live(n-1)`
//! or, from `Live(1)`, runs the deinitializer once and frees the allocation.
//! The refcount is a lock-free atomic word (§5: "no thread observes a
//! pointer whose count could reach zero concurrently" — the single-owner-
//! at-zero invariant); this module never takes a lock.
//!
//! The bit-exact [`BoxHeader`] has no room for an allocation size, so each
//! allocation is actually `{ total_size: usize, BoxHeader, payload }`: the
//! size word sits just before the header and is private to this module —
//! nothing outside `trill_release` ever reads it. The pointer handed to
//! callers still points at the payload, exactly `size_of::<BoxHeader>()`
//! bytes after the header, as the ABI promises.

use std::alloc::Layout;
use std::ffi::c_void;
use std::sync::atomic::Ordering;

use crate::error::fatal;
use crate::layout::BoxHeader;

const SIZE_PREFIX_BYTES: usize = std::mem::size_of::<usize>();

fn alloc_layout(total_size: usize) -> Layout {
    let align = std::mem::align_of::<BoxHeader>();
    Layout::from_size_align(SIZE_PREFIX_BYTES + std::mem::size_of::<BoxHeader>() + total_size, align)
        .unwrap_or_else(|_| fatal("trill_allocateIndirectType: box size overflows isize"))
}

unsafe fn header_of(payload: *mut c_void) -> *mut BoxHeader {
    (payload as *mut u8).sub(std::mem::size_of::<BoxHeader>()) as *mut BoxHeader
}

unsafe fn base_of(header: *mut BoxHeader) -> *mut u8 {
    (header as *mut u8).sub(SIZE_PREFIX_BYTES)
}

/// Zeroed allocation; fatal on failure (§6: "zeroed malloc; fatal on failure").
#[no_mangle]
pub unsafe extern "C" fn trill_alloc(size: usize) -> *mut c_void {
    if size == 0 {
        return std::ptr::NonNull::<u8>::dangling().as_ptr() as *mut c_void;
    }
    let layout =
        Layout::from_size_align(size, std::mem::align_of::<usize>()).unwrap_or_else(|_| fatal("trill_alloc: invalid size"));
    let ptr = std::alloc::alloc_zeroed(layout);
    if ptr.is_null() {
        fatal("trill_alloc: out of memory")
    }
    ptr as *mut c_void
}

/// Allocates a fresh box with refcount 1 and a zeroed payload, returning a
/// pointer to the payload (§6). `deinit` runs exactly once, when the last
/// reference is released.
#[no_mangle]
pub unsafe extern "C" fn trill_allocateIndirectType(
    payload_size: usize,
    deinit: Option<extern "C" fn(*mut c_void)>,
) -> *mut c_void {
    let layout = alloc_layout(payload_size);
    let base = std::alloc::alloc_zeroed(layout);
    if base.is_null() {
        fatal("trill_allocateIndirectType: out of memory")
    }
    *(base as *mut usize) = payload_size;
    let header = base.add(SIZE_PREFIX_BYTES) as *mut BoxHeader;
    (*header).refcount = std::sync::atomic::AtomicU32::new(1);
    (*header).deinit = deinit;
    (header as *mut u8).add(std::mem::size_of::<BoxHeader>()) as *mut c_void
}

/// `Live(n) -> Live(n+1)`. Fatal if the box is already dead or the count
/// would overflow (§4.8 state machine).
#[no_mangle]
pub unsafe extern "C" fn trill_retain(payload: *mut c_void) {
    let header = header_of(payload);
    let prev = (*header).refcount.fetch_add(1, Ordering::AcqRel);
    if prev == 0 {
        fatal("trill_retain: retain of a dead object")
    }
    if prev == u32::MAX {
        fatal("trill_retain: refcount overflow")
    }
}

/// `Live(n>1) -> Live(n-1)`, or from `Live(1)` runs the deinitializer once
/// and frees the allocation. Releasing a dead box is fatal (§4.8).
#[no_mangle]
pub unsafe extern "C" fn trill_release(payload: *mut c_void) {
    let header = header_of(payload);
    let prev = (*header).refcount.fetch_sub(1, Ordering::AcqRel);
    if prev == 0 {
        fatal("trill_release: release of a dead object")
    }
    if prev == 1 {
        if let Some(deinit) = (*header).deinit {
            deinit(payload);
        }
        let base = base_of(header);
        let payload_size = *(base as *const usize);
        std::alloc::dealloc(base, alloc_layout(payload_size));
    }
}

/// `true` iff the box's refcount is exactly 1 — used to implement
/// copy-on-write without a redundant clone (§4.8: array COW).
#[no_mangle]
pub unsafe extern "C" fn trill_isUniquelyReferenced(payload: *mut c_void) -> u8 {
    let header = header_of(payload);
    ((*header).refcount.load(Ordering::Acquire) == 1) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn allocate_retain_release_balances_to_one_deinit() {
        static DEINIT_COUNT: AtomicU32 = AtomicU32::new(0);
        extern "C" fn on_deinit(_payload: *mut c_void) {
            DEINIT_COUNT.fetch_add(1, Ordering::SeqCst);
        }
        unsafe {
            let payload = trill_allocateIndirectType(8, Some(on_deinit));
            trill_retain(payload);
            trill_retain(payload);
            assert_eq!(trill_isUniquelyReferenced(payload), 0);
            trill_release(payload);
            trill_release(payload);
            assert_eq!(trill_isUniquelyReferenced(payload), 1);
            assert_eq!(DEINIT_COUNT.load(Ordering::SeqCst), 0);
            trill_release(payload);
            assert_eq!(DEINIT_COUNT.load(Ordering::SeqCst), 1);
        }
    }

    #[test]
    fn freshly_allocated_box_is_uniquely_referenced() {
        unsafe {
            let payload = trill_allocateIndirectType(16, None);
            assert_eq!(trill_isUniquelyReferenced(payload), 1);
            trill_release(payload);
        }
    }
}
