// ── Console encoding enabler ──────────────────────────────────────────────────
//
// The idempotent enable protocol: gate checks, one native downcall, stream
// reconciliation, structured outcome.  All collaborators arrive as injected
// traits (see `platform`); this module contains no `unsafe` and no I/O of
// its own.

use std::error::Error;
use std::fmt;
use std::num::ParseIntError;
use std::sync::{Mutex, PoisonError};

use crate::outcome::{CallReturnedFalse, EnableOutcome, FailureReason};
use crate::platform::{
    AdvisorySink, ConsoleControl, HostPlatform, LoadError, OsFamily, OutputStreams,
    PlatformIdentity, ProcessStreams, StderrAdvisories,
};

// ── Gate parameters ───────────────────────────────────────────────────────────

/// The UTF-8 code page identifier passed to the native call (`chcp 65001`).
pub const UTF8_CODE_PAGE: u32 = 65001;

/// Minimum supported Windows feature-update major version (21H2).
pub const MIN_SUPPORTED_MAJOR: u32 = 21;

/// First version that needs no advisory (22H2 and later).
pub const RECOMMENDED_MAJOR: u32 = 22;

// ── Enabler ───────────────────────────────────────────────────────────────────

/// One-shot switch of the Windows console to UTF-8 output.
///
/// `enable()` is safe to call concurrently and repeatedly; it never panics
/// and never returns an error type — every failure mode is a variant of
/// [`EnableOutcome`].  The first call that reaches `Success` freezes the
/// result: later calls observe `AlreadyEnabled` without touching the
/// platform or the streams again.
pub struct ConsoleEncodingEnabler {
    platform: Box<dyn PlatformIdentity>,
    control: Box<dyn ConsoleControl>,
    streams: Box<dyn OutputStreams>,
    advisories: Box<dyn AdvisorySink>,
    /// The process-wide cached outcome; `None` until the first attempt.
    last: Mutex<Option<EnableOutcome>>,
}

impl ConsoleEncodingEnabler {
    /// Production wiring: real host identity, real kernel32, real streams,
    /// advisories on stderr.
    pub fn new() -> Self {
        #[cfg(windows)]
        let control: Box<dyn ConsoleControl> = Box::new(crate::platform::win32::Kernel32Control);
        #[cfg(not(windows))]
        let control: Box<dyn ConsoleControl> = Box::new(crate::platform::NoConsoleControl);

        Self::with_parts(
            Box::new(HostPlatform),
            control,
            Box::new(ProcessStreams),
            Box::new(StderrAdvisories),
        )
    }

    /// Build an enabler around injected collaborators.  Tests construct a
    /// fresh instance per case so no state leaks between them.
    pub fn with_parts(
        platform: Box<dyn PlatformIdentity>,
        control: Box<dyn ConsoleControl>,
        streams: Box<dyn OutputStreams>,
        advisories: Box<dyn AdvisorySink>,
    ) -> Self {
        Self {
            platform,
            control,
            streams,
            advisories,
            last: Mutex::new(None),
        }
    }

    /// Run the enable protocol, or short-circuit if it already succeeded.
    ///
    /// The cached-outcome lock is held across the whole attempt, so under
    /// concurrent first calls at most one thread performs the native
    /// sequence; the rest wait, observe the cached terminal result, and
    /// return `AlreadyEnabled`.
    pub fn enable(&self) -> EnableOutcome {
        let mut slot = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(
            *slot,
            Some(EnableOutcome::Success | EnableOutcome::AlreadyEnabled)
        ) {
            return EnableOutcome::AlreadyEnabled;
        }

        // A cached failure does not short-circuit: the caller may retry after
        // fixing the environment (the protocol itself never retries).
        let outcome = self.attempt();
        *slot = Some(outcome.clone());
        outcome
    }

    /// The cached outcome of the most recent attempt, without triggering the
    /// protocol.  `None` if `enable()` was never called.
    pub fn last_outcome(&self) -> Option<EnableOutcome> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// One full pass through the gates.  Caller holds the slot lock.
    fn attempt(&self) -> EnableOutcome {
        // Platform gate — nothing native is touched on the wrong OS family.
        if self.platform.os_family() != OsFamily::Windows {
            return EnableOutcome::failure(FailureReason::UnsupportedPlatform, None);
        }

        // Version gate.
        let version = match self.platform.runtime_version() {
            Ok(v) => v,
            Err(e) => {
                return EnableOutcome::failure(FailureReason::UnsupportedRuntimeVersion, Some(e))
            }
        };
        if let Err(e) = self.check_version(&version) {
            return EnableOutcome::failure(
                FailureReason::UnsupportedRuntimeVersion,
                Some(Box::new(e)),
            );
        }

        // Native library resolution.  The RAII library value drops (and
        // releases the module handle) on every path out of this function.
        let library = match self.control.load_library() {
            Ok(lib) => lib,
            Err(LoadError::AccessDenied(e)) => {
                return EnableOutcome::failure(FailureReason::NativeAccessDenied, Some(e))
            }
            Err(LoadError::NotFound(e)) => {
                return EnableOutcome::failure(FailureReason::NativeLibraryNotFound, Some(e))
            }
        };

        // Native function resolution.
        let setter = match library.set_output_code_page() {
            Ok(s) => s,
            Err(e) => {
                return EnableOutcome::failure(FailureReason::NativeFunctionNotFound, Some(e))
            }
        };

        // Native invocation.
        match setter.invoke(UTF8_CODE_PAGE) {
            Ok(true) => {}
            Ok(false) => {
                return EnableOutcome::failure(
                    FailureReason::NativeCallFailed,
                    Some(Box::new(CallReturnedFalse)),
                )
            }
            Err(e) => return EnableOutcome::failure(FailureReason::NativeCallFailed, Some(e)),
        }

        // Stream reconciliation.  If this fails the console code page has
        // already changed and stays changed: there is no compensating
        // rollback, and the partial state is reported as a failure.
        if let Err(e) = self.streams.reconfigure_utf8() {
            return EnableOutcome::failure(
                FailureReason::StreamReconfigurationFailed,
                Some(Box::new(e)),
            );
        }

        EnableOutcome::Success
    }

    /// Apply the version gate to a raw version string.
    ///
    /// Emits at most one advisory (minimum-but-not-recommended versions);
    /// advisories never alter the outcome.
    fn check_version(&self, version: &str) -> Result<(), VersionError> {
        let major = parse_major(version)?;

        // Legacy year-form versions ("1909", "2004") all predate 21H2.
        if major < MIN_SUPPORTED_MAJOR || major >= 1000 {
            return Err(VersionError::BelowMinimum {
                version: version.to_owned(),
                major,
            });
        }

        if major < RECOMMENDED_MAJOR {
            self.advisories.advise(&format!(
                "Windows {version} is the minimum supported for UTF-8 console output; \
                 {RECOMMENDED_MAJOR}H2 or later is recommended."
            ));
        }

        Ok(())
    }
}

impl Default for ConsoleEncodingEnabler {
    fn default() -> Self {
        Self::new()
    }
}

// ── Version parsing ───────────────────────────────────────────────────────────

/// Why a version string failed the runtime-version gate.
#[derive(Debug)]
pub enum VersionError {
    /// No leading decimal digits to parse a major version from.
    Unparsable {
        version: String,
        source: ParseIntError,
    },
    /// Parsed, but below the minimum supported major version.
    BelowMinimum { version: String, major: u32 },
}

impl fmt::Display for VersionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparsable { version, .. } => {
                write!(f, "cannot parse Windows version {version:?}")
            }
            Self::BelowMinimum { version, .. } => {
                write!(
                    f,
                    "Windows version {version} is below the minimum supported \
                     ({MIN_SUPPORTED_MAJOR}H2)"
                )
            }
        }
    }
}

impl Error for VersionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Unparsable { source, .. } => Some(source),
            Self::BelowMinimum { .. } => None,
        }
    }
}

/// Parse the leading decimal digits of a version string as the major version:
/// `"21H2"` → 21, `"23.0.1"` → 23.
fn parse_major(version: &str) -> Result<u32, VersionError> {
    let digits = version
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or("");
    digits.parse::<u32>().map_err(|source| VersionError::Unparsable {
        version: version.to_owned(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
