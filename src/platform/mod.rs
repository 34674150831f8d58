// ── Platform abstraction layer ────────────────────────────────────────────────
//
// This module defines the collaborator interfaces the enabler talks to: the
// platform identity provider, the native console-control boundary, the process
// output streams, and the advisory side channel.  No `unsafe` lives here; all
// Win32 FFI is confined to the `win32` sub-module and never leaks outward.
//
// Production binds these traits to the real OS; tests bind them to scripted
// stubs.  The enabler only ever sees the traits.

use std::io::{self, Write};

use crate::outcome::BoxError;

#[cfg(windows)]
pub mod win32;

// ── Platform identity ─────────────────────────────────────────────────────────

/// Host OS family, as coarse as the enable protocol needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Unix,
    Unknown,
}

impl OsFamily {
    /// The family this process is actually running on.
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Self::Windows,
            "linux" | "macos" | "android" | "ios" | "freebsd" | "netbsd" | "openbsd"
            | "dragonfly" | "solaris" | "illumos" => Self::Unix,
            _ => Self::Unknown,
        }
    }
}

/// Read-only identity of the host: OS family and runtime version string.
pub trait PlatformIdentity: Send + Sync {
    fn os_family(&self) -> OsFamily;

    /// The Windows feature-update version string (`"21H2"`, `"23H2"`, …).
    ///
    /// Only consulted after the OS-family gate has passed.  An `Err` means the
    /// version could not be determined at all; an unparsable `Ok` string is
    /// the version gate's problem, not this provider's.
    fn runtime_version(&self) -> Result<String, BoxError>;
}

/// Production identity provider: answers from the running host.
pub struct HostPlatform;

impl PlatformIdentity for HostPlatform {
    fn os_family(&self) -> OsFamily {
        OsFamily::current()
    }

    #[cfg(windows)]
    fn runtime_version(&self) -> Result<String, BoxError> {
        win32::display_version()
    }

    #[cfg(not(windows))]
    fn runtime_version(&self) -> Result<String, BoxError> {
        // Unreachable through the protocol (the OS-family gate rejects first),
        // but the trait still needs an honest answer here.
        Err(io::Error::other("no Windows version on this platform").into())
    }
}

// ── Native console control ────────────────────────────────────────────────────
//
// Three chained primitives, mirroring the real downcall sequence: load the
// console-control library, resolve the set-output-code-page export inside it,
// invoke it with a code-page id.  The callable borrows the library value, so
// the module handle outlives every use of the function pointer and is
// released when the library value drops.

/// How loading the console-control library failed.  The two conditions map to
/// different failure reasons, so they are distinguished here at the source.
#[derive(Debug)]
pub enum LoadError {
    /// The library is absent (or failed to load for any reason other than
    /// an access denial).
    NotFound(BoxError),
    /// The host refused access to the native boundary.
    AccessDenied(BoxError),
}

/// Entry point of the native boundary: resolves the console-control library.
pub trait ConsoleControl: Send + Sync {
    fn load_library(&self) -> Result<Box<dyn ConsoleLibrary + '_>, LoadError>;
}

/// A loaded console-control library.
pub trait ConsoleLibrary {
    /// Resolve the "set console output code page" entry point.
    fn set_output_code_page(&self) -> Result<Box<dyn CodePageSetter + '_>, BoxError>;
}

/// The bound entry point: `(code_page) -> bool`.
pub trait CodePageSetter {
    /// Invoke the native function.  `Ok(false)` is a clean API-level refusal;
    /// `Err` means the downcall itself failed.
    fn invoke(&self, code_page: u32) -> Result<bool, BoxError>;
}

/// Stand-in control for non-Windows builds.  Never reached through the
/// protocol (the OS-family gate rejects first).
#[cfg(not(windows))]
pub struct NoConsoleControl;

#[cfg(not(windows))]
impl ConsoleControl for NoConsoleControl {
    fn load_library(&self) -> Result<Box<dyn ConsoleLibrary + '_>, LoadError> {
        Err(LoadError::NotFound(
            io::Error::other("no console-control library on this platform").into(),
        ))
    }
}

// ── Process output streams ────────────────────────────────────────────────────

/// The program's own stdout/stderr sinks, reconciled after the code-page
/// switch.
pub trait OutputStreams: Send + Sync {
    fn reconfigure_utf8(&self) -> io::Result<()>;
}

/// Production streams.
///
/// Rust's standard streams already emit UTF-8 bytes, so there is no encoder
/// to swap in; reconciliation reduces to flushing whatever was buffered under
/// the old code page, so it is not rendered under the new one.
pub struct ProcessStreams;

impl OutputStreams for ProcessStreams {
    fn reconfigure_utf8(&self) -> io::Result<()> {
        io::stdout().flush()?;
        io::stderr().flush()?;
        Ok(())
    }
}

// ── Advisory side channel ─────────────────────────────────────────────────────

/// Sink for non-fatal diagnostics.  Advisories never alter the outcome.
pub trait AdvisorySink: Send + Sync {
    fn advise(&self, message: &str);
}

/// Production sink: one `WARNING:` line on stderr.
pub struct StderrAdvisories;

impl AdvisorySink for StderrAdvisories {
    fn advise(&self, message: &str) {
        eprintln!("WARNING: {message}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_family_matches_compile_target() {
        let family = OsFamily::current();
        if cfg!(windows) {
            assert_eq!(family, OsFamily::Windows);
        } else {
            assert_ne!(family, OsFamily::Windows);
        }
    }

    #[test]
    fn host_platform_reports_current_family() {
        assert_eq!(HostPlatform.os_family(), OsFamily::current());
    }

    #[cfg(not(windows))]
    #[test]
    fn no_console_control_reports_not_found() {
        match NoConsoleControl.load_library() {
            Err(LoadError::NotFound(_)) => {}
            _ => panic!("expected NotFound"),
        }
    }

    #[test]
    fn process_streams_flush_cleanly() {
        // Nothing buffered in the test harness; flushing must still succeed.
        assert!(ProcessStreams.reconfigure_utf8().is_ok());
    }
}
