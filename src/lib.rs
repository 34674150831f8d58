//! Switch a Windows console to UTF-8 output, once, at process startup.
//!
//! Programs that print non-ASCII text into a console whose output code page
//! is some legacy default (437, 850, …) come out garbled.  Calling
//! [`enable()`] once at the top of `main` flips the console's output code
//! page to UTF-8 (the `chcp 65001` effect) through a runtime-resolved
//! `SetConsoleOutputCP` downcall, reconciles the process's own output
//! streams, and reports a structured [`EnableOutcome`].  It never panics and
//! never errors past its boundary; on non-Windows hosts it simply reports
//! `UnsupportedPlatform` and leaves everything untouched.
//!
//! ```no_run
//! let outcome = unicon::enable();
//! if !outcome.is_enabled() {
//!     eprintln!("continuing with the console's existing code page: {outcome}");
//! }
//! ```

// ── Safety policy ────────────────────────────────────────────────────────────
// Unsafe code is forbidden everywhere except `platform::win32`, which owns
// all Win32 FFI.  Each unsafe block there MUST carry a `// SAFETY:` comment.
#![deny(unsafe_code)]

mod enabler;
mod outcome;
pub mod platform;

pub use enabler::{
    ConsoleEncodingEnabler, VersionError, MIN_SUPPORTED_MAJOR, RECOMMENDED_MAJOR, UTF8_CODE_PAGE,
};
pub use outcome::{BoxError, CallReturnedFalse, Cause, EnableOutcome, FailureReason};

use std::sync::OnceLock;

use platform::OsFamily;

// ── Process-wide convenience API ──────────────────────────────────────────────
//
// Host applications almost always want exactly one enabler for the whole
// process; these free functions wrap a lazily-built production instance.
// Tests that need isolation construct their own `ConsoleEncodingEnabler`.

static ENABLER: OnceLock<ConsoleEncodingEnabler> = OnceLock::new();

fn global() -> &'static ConsoleEncodingEnabler {
    ENABLER.get_or_init(ConsoleEncodingEnabler::new)
}

/// Enable UTF-8 console output.  Safe to call repeatedly and from multiple
/// threads; see [`ConsoleEncodingEnabler::enable`].
pub fn enable() -> EnableOutcome {
    global().enable()
}

/// The cached outcome of the most recent [`enable()`] call, if any.
pub fn last_outcome() -> Option<EnableOutcome> {
    ENABLER.get().and_then(ConsoleEncodingEnabler::last_outcome)
}

/// Pure platform check: is this a host whose console [`enable()`] could
/// switch?  No side effects, usable without ever calling `enable()`.
pub fn is_supported_platform() -> bool {
    OsFamily::current() == OsFamily::Windows
}

// ── Tests ─────────────────────────────────────────────────────────────────────
