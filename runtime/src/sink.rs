/*!
Log Sinks - adapters from raw foreign callbacks to an invocable sink

A foreign function pointer is wrapped once, at registration, into a value
implementing `LogSink`; the router only ever calls `emit`. Two delivery
modes exist:

- borrowed: the callback receives a pointer valid only during the call and
  must not keep it. Nothing is allocated per line.
- transfer: the callback receives a freshly allocated copy and becomes its
  owner. It must hand the pointer back to `free_log_memory` (or the batch
  variant) exactly once, at any later time, from any thread.
*/

use crate::block::{alloc_c_buffer, free_c_buffer};
use std::ffi::{CStr, c_char};
use std::fmt;

/// Foreign callback receiving a line borrowed for the duration of the call
pub type BorrowedLogFn = unsafe extern "C" fn(line: *const c_char);

/// Foreign callback receiving ownership of a line
pub type TransferLogFn = unsafe extern "C" fn(line: *mut c_char);

/// Consumer of formatted, NUL-terminated log lines
///
/// Sinks may be invoked concurrently from many threads; one call delivers
/// exactly one whole line.
pub trait LogSink: Send + Sync {
    fn emit(&self, line: &CStr);
}

impl<F> LogSink for F
where
    F: Fn(&CStr) + Send + Sync,
{
    fn emit(&self, line: &CStr) {
        self(line)
    }
}

/// Zero-copy delivery to a foreign callback
#[derive(Clone, Copy)]
pub struct BorrowedCallback(BorrowedLogFn);

impl BorrowedCallback {
    /// # Safety
    /// `callback` must stay callable for as long as it is registered and must
    /// not retain the pointer it receives beyond the call.
    pub unsafe fn new(callback: BorrowedLogFn) -> Self {
        Self(callback)
    }
}

impl LogSink for BorrowedCallback {
    fn emit(&self, line: &CStr) {
        unsafe { (self.0)(line.as_ptr()) }
    }
}

impl fmt::Debug for BorrowedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BorrowedCallback({:p})", self.0 as *const ())
    }
}

/// Ownership-transferring delivery to a foreign callback
#[derive(Clone, Copy)]
pub struct TransferCallback(TransferLogFn);

impl TransferCallback {
    /// # Safety
    /// `callback` must stay callable for as long as it is registered, and
    /// every pointer it receives must eventually reach `release_line` once.
    pub unsafe fn new(callback: TransferLogFn) -> Self {
        Self(callback)
    }
}

impl LogSink for TransferCallback {
    fn emit(&self, line: &CStr) {
        let owned = alloc_c_buffer(line.to_bytes()).as_ptr();
        unsafe { (self.0)(owned) }
    }
}

impl fmt::Debug for TransferCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransferCallback({:p})", self.0 as *const ())
    }
}

/// Free one transferred line. Null is ignored; the receiver may have
/// written into the buffer.
///
/// # Safety
/// A non-null `line` must have been handed out by a `TransferCallback` and
/// not released before.
pub unsafe fn release_line(line: *mut c_char) {
    unsafe { free_c_buffer(line) }
}

/// Free every transferred line in `lines`, skipping nulls.
///
/// # Safety
/// Same contract as `release_line` for each non-null entry; no entry may
/// appear twice.
pub unsafe fn release_lines(lines: &[*mut c_char]) {
    for &line in lines {
        unsafe { release_line(line) }
    }
}
