// ── Win32 platform implementation ─────────────────────────────────────────────
//
// This is the only module in the codebase where `unsafe` code is permitted.
// Every `unsafe` block MUST carry a `// SAFETY:` comment that states:
//   • which invariant makes the operation sound, and
//   • what the caller is responsible for maintaining.
//
// Nothing in this module is `pub` beyond what callers genuinely need; keep the
// unsafe surface as small as possible.
//
// ── Module ownership model ────────────────────────────────────────────────────
//
// `Kernel32` owns the single `LoadLibraryW` call for `kernel32.dll` and calls
// `FreeLibrary` on `Drop`.  The bound `SetConsoleOutputCP` callable borrows
// the `Kernel32` value, so the function pointer can never outlive the module
// handle it was resolved from — the borrow checker enforces the release-on-
// every-exit-path rule for us.
//
// `SetConsoleOutputCP` is resolved by name at runtime rather than linked
// statically: the resolve-library / resolve-symbol / invoke boundary is the
// seam tests script against, and production goes through the same seam.

#![allow(unsafe_code)]

use std::marker::PhantomData;

use windows::core::{HSTRING, PCSTR, PCWSTR};
use windows::Win32::Foundation::{BOOL, ERROR_ACCESS_DENIED, ERROR_SUCCESS, HMODULE};
use windows::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryW};
use windows::Win32::System::Registry::{
    RegCloseKey, RegOpenKeyExW, RegQueryValueExW, HKEY, HKEY_LOCAL_MACHINE, KEY_READ,
    REG_VALUE_TYPE,
};

use crate::outcome::BoxError;
use crate::platform::{CodePageSetter, ConsoleControl, ConsoleLibrary, LoadError};

// ── Native identities ─────────────────────────────────────────────────────────

const DLL_NAME: &str = "kernel32.dll";
const SET_OUTPUT_CP_EXPORT: &[u8] = b"SetConsoleOutputCP\0";

// ── Console control ───────────────────────────────────────────────────────────

/// Production `ConsoleControl`: loads the real `kernel32.dll`.
pub struct Kernel32Control;

impl ConsoleControl for Kernel32Control {
    fn load_library(&self) -> Result<Box<dyn ConsoleLibrary + '_>, LoadError> {
        let lib = Kernel32::load()?;
        Ok(Box::new(lib))
    }
}

/// RAII handle to the loaded `kernel32.dll`.
///
/// `FreeLibrary` runs on `Drop`, so the module handle is released on every
/// exit path of the enable protocol, error paths included.
struct Kernel32(HMODULE);

impl Kernel32 {
    fn load() -> Result<Self, LoadError> {
        let name: Vec<u16> = DLL_NAME.encode_utf16().chain(std::iter::once(0)).collect();
        // SAFETY: `name` is a valid null-terminated UTF-16 string that
        // outlives the call.
        match unsafe { LoadLibraryW(PCWSTR(name.as_ptr())) } {
            Ok(module) => Ok(Self(module)),
            // An access denial (host policy, restricted token) is a different
            // condition from a missing library and maps to a different
            // failure reason upstream.
            Err(e) if e.code() == ERROR_ACCESS_DENIED.to_hresult() => {
                Err(LoadError::AccessDenied(Box::new(e)))
            }
            Err(e) => Err(LoadError::NotFound(Box::new(e))),
        }
    }
}

impl ConsoleLibrary for Kernel32 {
    fn set_output_code_page(&self) -> Result<Box<dyn CodePageSetter + '_>, BoxError> {
        // SAFETY: `self.0` is a live module handle (we hold the RAII owner),
        // and the export name is a valid null-terminated ANSI string.
        let addr = unsafe { GetProcAddress(self.0, PCSTR(SET_OUTPUT_CP_EXPORT.as_ptr())) };
        let Some(addr) = addr else {
            return Err(Box::new(windows::core::Error::from_win32()));
        };
        // SAFETY: `SetConsoleOutputCP` has the documented signature
        // `BOOL WINAPI SetConsoleOutputCP(UINT wCodePageID)`; rebinding the
        // export address to that shape is the point of the dynamic lookup.
        let func: unsafe extern "system" fn(u32) -> BOOL = unsafe { std::mem::transmute(addr) };
        Ok(Box::new(SetOutputCp {
            func,
            _lib: PhantomData,
        }))
    }
}

impl Drop for Kernel32 {
    fn drop(&mut self) {
        // SAFETY: `self.0` came from a successful LoadLibraryW and has not
        // been freed since.
        unsafe {
            let _ = FreeLibrary(self.0);
        }
    }
}

/// The bound `SetConsoleOutputCP` callable.
///
/// Borrows the `Kernel32` value, so the module cannot be freed while the
/// function pointer is still invocable.
struct SetOutputCp<'a> {
    func: unsafe extern "system" fn(u32) -> BOOL,
    _lib: PhantomData<&'a Kernel32>,
}

impl CodePageSetter for SetOutputCp<'_> {
    fn invoke(&self, code_page: u32) -> Result<bool, BoxError> {
        // SAFETY: `func` was resolved from the kernel32 module that `self`
        // borrows; the argument is a plain integer.  A FALSE return is a
        // clean API-level refusal, reported as `Ok(false)`.
        let ok = unsafe { (self.func)(code_page) };
        Ok(ok.as_bool())
    }
}

// ── OS version ────────────────────────────────────────────────────────────────

/// Read the Windows feature-update version (the `DisplayVersion` value,
/// e.g. `"21H2"`, `"23H2"`) from the registry.
///
/// Pre-20H2 installs carry only the legacy year-form `ReleaseId`; those have
/// no `DisplayVersion` value and surface here as an `Err`, which the version
/// gate reports as `UnsupportedRuntimeVersion`.
pub(crate) fn display_version() -> Result<String, BoxError> {
    let subkey = HSTRING::from(r"SOFTWARE\Microsoft\Windows NT\CurrentVersion");
    let value = HSTRING::from("DisplayVersion");

    // SAFETY: every pointer below refers to a live local; the opened key is
    // closed before returning on each path that opened it.
    unsafe {
        let mut hkey = HKEY::default();
        let status = RegOpenKeyExW(HKEY_LOCAL_MACHINE, &subkey, 0, KEY_READ, &mut hkey);
        if status != ERROR_SUCCESS {
            return Err(Box::new(windows::core::Error::from(status.to_hresult())));
        }

        let mut kind = REG_VALUE_TYPE(0);
        let mut buffer = [0u16; 32];
        let mut size = (buffer.len() * 2) as u32;
        let status = RegQueryValueExW(
            hkey,
            &value,
            None,
            Some(&mut kind),
            Some(buffer.as_mut_ptr() as *mut u8),
            Some(&mut size),
        );
        let _ = RegCloseKey(hkey);
        if status != ERROR_SUCCESS {
            return Err(Box::new(windows::core::Error::from(status.to_hresult())));
        }

        // `size` is in bytes and includes the terminator when the value was
        // stored with one.
        let chars = (size as usize) / 2;
        let len = buffer[..chars]
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(chars);
        Ok(String::from_utf16_lossy(&buffer[..len]))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // These run against the real OS, so they only assert properties that hold
    // on any Windows install the test suite can land on.

    #[test]
    fn kernel32_loads_and_exports_the_setter() {
        let lib = Kernel32::load().expect("kernel32.dll must load on Windows");
        assert!(lib.set_output_code_page().is_ok());
    }

    #[test]
    fn display_version_is_nonempty_when_present() {
        // Absent on pre-20H2 installs; when present it must be a non-empty
        // string like "21H2".
        if let Ok(v) = display_version() {
            assert!(!v.is_empty());
        }
    }
}
