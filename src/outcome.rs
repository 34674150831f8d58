// ── Enable outcome ────────────────────────────────────────────────────────────
//
// Every call to `enable()` returns an `EnableOutcome`.  Nothing in this crate
// panics or propagates an error past the `enable()` boundary; all failure
// paths are represented here as data.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Type-erased error carried out of a collaborator at the point of detection.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Underlying cause attached to a `Failure` outcome.
///
/// Shared (`Arc`) rather than owned so the cached outcome can be cloned out
/// of the process-wide slot on later `last_outcome()` calls.
pub type Cause = Arc<dyn Error + Send + Sync + 'static>;

/// Result of attempting to enable UTF-8 console output.
#[derive(Debug, Clone)]
pub enum EnableOutcome {
    /// The native call and stream reconciliation both completed on this call.
    Success,

    /// A prior call already reached `Success`; this call was a no-op.
    AlreadyEnabled,

    /// A gate of the enable protocol rejected the attempt.
    Failure {
        /// Which gate rejected the attempt.
        reason: FailureReason,
        /// The underlying error, where one exists.
        cause: Option<Cause>,
    },
}

impl EnableOutcome {
    /// True for `Success` and `AlreadyEnabled`.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Success | Self::AlreadyEnabled)
    }

    /// The failure reason, or `None` for the two non-failure variants.
    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            Self::Failure { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// The underlying cause, where the outcome carries one.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            Self::Failure { cause: Some(c), .. } => Some(c.as_ref()),
            _ => None,
        }
    }

    pub(crate) fn failure(reason: FailureReason, cause: Option<BoxError>) -> Self {
        Self::Failure {
            reason,
            cause: cause.map(Arc::from),
        }
    }
}

impl fmt::Display for EnableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "UTF-8 console output enabled"),
            Self::AlreadyEnabled => write!(f, "UTF-8 console output was already enabled"),
            Self::Failure { reason, cause } => {
                write!(f, "failed: {}", reason.description())?;
                if let Some(c) = cause {
                    write!(f, " ({c})")?;
                }
                Ok(())
            }
        }
    }
}

/// Which gate of the enable protocol rejected the attempt.
///
/// Each reason names exactly one gate; no reason is shared between gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// Not running on Windows.
    UnsupportedPlatform,
    /// The Windows version is below the minimum, or could not be parsed.
    UnsupportedRuntimeVersion,
    /// The host blocked access to the native console-control library.
    NativeAccessDenied,
    /// The console-control library could not be loaded.
    NativeLibraryNotFound,
    /// The set-output-code-page entry point is not exported by the library.
    NativeFunctionNotFound,
    /// The native call errored, or returned `false`.
    NativeCallFailed,
    /// The process output streams could not be reconciled after the call.
    StreamReconfigurationFailed,
}

impl FailureReason {
    /// Short human-readable description, used by `Display` on the outcome.
    pub fn description(self) -> &'static str {
        match self {
            Self::UnsupportedPlatform => "not running on Windows",
            Self::UnsupportedRuntimeVersion => "unsupported Windows version",
            Self::NativeAccessDenied => "native access not available",
            Self::NativeLibraryNotFound => "console-control library not found",
            Self::NativeFunctionNotFound => "set-output-code-page function not found",
            Self::NativeCallFailed => "native console call failed",
            Self::StreamReconfigurationFailed => "failed to reconfigure output streams",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Synthetic cause for a clean `FALSE` return from the native call.
///
/// Kept as its own type, distinct from any propagated error, so diagnostics
/// can tell "the API refused" apart from "the downcall itself blew up".
#[derive(Debug)]
pub struct CallReturnedFalse;

impl fmt::Display for CallReturnedFalse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("set-output-code-page call returned false")
    }
}

impl Error for CallReturnedFalse {}

// ── Tests ─────────────────────────────────────────────────────────────────────
