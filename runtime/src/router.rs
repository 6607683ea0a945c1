/*!
Log Router - process-wide destination for formatted log lines

The router holds the active sink and the severity threshold. Emission is
lock-free and may happen from any number of threads at once: the threshold
is an atomic and the sink sits in an `ArcSwapOption`, loaded once per line.
Registration is meant for setup and teardown from a single thread; two
threads reconfiguring at once simply race, and the last store wins. Nothing
makes the (sink, threshold) pair atomic.

With no sink registered every emission is a silent no-op. There is no
console fallback.
*/

use crate::config::LogConfig;
use crate::format::{self, Record};
use crate::level::Severity;
use crate::logger::StructuredLogger;
use crate::sink::{
    self, BorrowedCallback, BorrowedLogFn, LogSink, TransferCallback, TransferLogFn,
};
use arc_swap::ArcSwapOption;
use std::ffi::{CStr, c_char};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, LazyLock};
use time::{OffsetDateTime, UtcOffset};

static GLOBAL: LazyLock<LogRouter> = LazyLock::new(|| LogRouter::new(LogConfig::from_env()));

static ROUTER_LOG: LazyLock<StructuredLogger> =
    LazyLock::new(StructuredLogger::for_type::<LogRouter>);

type SharedSink = Box<dyn LogSink>;

pub struct LogRouter {
    config: LogConfig,
    threshold: AtomicU8,
    sink: ArcSwapOption<SharedSink>,
    /// Resolved once; querying the local offset per line is not possible
    /// soundly in a multi-threaded process.
    offset: UtcOffset,
}

impl LogRouter {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            threshold: AtomicU8::new(config.threshold as u8),
            sink: ArcSwapOption::empty(),
            offset: UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
        }
    }

    /// The router behind the exported C functions, configured from the
    /// environment on first use
    pub fn global() -> &'static LogRouter {
        &GLOBAL
    }

    pub fn config(&self) -> LogConfig {
        self.config
    }

    pub fn threshold(&self) -> Severity {
        Severity::from_ordinal(self.threshold.load(Ordering::Relaxed) as i32)
            .unwrap_or(self.config.threshold)
    }

    pub fn set_threshold(&self, level: Severity) {
        self.threshold.store(level as u8, Ordering::SeqCst);
    }

    pub fn has_sink(&self) -> bool {
        self.sink.load().is_some()
    }

    fn passes(&self, level: Severity) -> bool {
        level as u8 >= self.threshold.load(Ordering::Relaxed)
    }

    /// Whether a line at `level` would reach a sink. Checked before any
    /// formatting work.
    pub fn enabled(&self, level: Severity) -> bool {
        self.passes(level) && self.has_sink()
    }

    /// Install `sink`, replacing the previous one
    pub fn register_sink(&self, sink: impl LogSink + 'static) {
        let sink: SharedSink = Box::new(sink);
        self.sink.store(Some(Arc::new(sink)));
    }

    pub fn register_sink_with_threshold(&self, sink: impl LogSink + 'static, level: Severity) {
        self.set_threshold(level);
        self.register_sink(sink);
    }

    /// # Safety
    /// See `BorrowedCallback::new`.
    pub unsafe fn register_borrowed(&self, callback: BorrowedLogFn) {
        self.register_sink(unsafe { BorrowedCallback::new(callback) });
    }

    /// # Safety
    /// See `TransferCallback::new`.
    pub unsafe fn register_transfer(&self, callback: TransferLogFn) {
        self.register_sink(unsafe { TransferCallback::new(callback) });
    }

    /// # Safety
    /// See `BorrowedCallback::new`.
    pub unsafe fn register_borrowed_with_threshold(&self, callback: BorrowedLogFn, level: Severity) {
        self.register_sink_with_threshold(unsafe { BorrowedCallback::new(callback) }, level);
    }

    /// # Safety
    /// See `TransferCallback::new`.
    pub unsafe fn register_transfer_with_threshold(&self, callback: TransferLogFn, level: Severity) {
        self.register_sink_with_threshold(unsafe { TransferCallback::new(callback) }, level);
    }

    /// Remove the sink; later emissions are dropped
    pub fn clear(&self) {
        self.sink.store(None);
    }

    /// Remove the sink and restore the configured threshold
    pub fn reset(&self) {
        self.clear();
        self.set_threshold(self.config.threshold);
    }

    pub fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    /// Deliver an already formatted line, subject to the threshold
    pub fn dispatch(&self, level: Severity, line: &CStr) {
        if !self.passes(level) {
            return;
        }
        if let Some(sink) = &*self.sink.load() {
            sink.emit(line);
        }
    }

    /// Format `record` and deliver it as one sink call. Lines below the
    /// threshold, or with no sink installed, are dropped before formatting.
    pub fn emit(&self, record: &Record<'_>) {
        if self.passes(record.level) {
            self.deliver(record);
        }
    }

    /// Format and deliver `record` whatever the threshold. Reports about the
    /// caller's own registration go this way so they cannot be filtered out.
    fn deliver(&self, record: &Record<'_>) {
        let guard = self.sink.load();
        let Some(sink) = &*guard else {
            return;
        };
        format::with_line(self.now(), record, |line| sink.emit(line));
    }
}

impl std::fmt::Debug for LogRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogRouter")
            .field("threshold", &self.threshold())
            .field("has_sink", &self.has_sink())
            .field("offset", &self.offset)
            .finish()
    }
}

/// Install `sink` on the global router with a raw threshold. An ordinal
/// outside the contract keeps the previous threshold and is reported
/// through the new sink, even when that threshold is above `Warning`.
fn install_with_raw_level(sink: impl LogSink + 'static, raw: i32) {
    let router = LogRouter::global();
    match Severity::try_from(raw) {
        Ok(level) => router.register_sink_with_threshold(sink, level),
        Err(err) => {
            router.register_sink(sink);
            router.deliver(&Record {
                level: Severity::Warning,
                module: ROUTER_LOG.module(),
                site: format::site_name(file!()),
                line: line!(),
                message: format_args!("{err}; keeping threshold {}", router.threshold()),
            });
        }
    }
}

// ============================================================================
// FFI functions
// ============================================================================

/// Register a borrowed-delivery log callback; null clears the sink
///
/// # Safety
/// `callback` must remain callable until replaced or cleared, must tolerate
/// concurrent calls, and must not keep the pointer it receives.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn register_sync_callback(callback: Option<BorrowedLogFn>) {
    let router = LogRouter::global();
    match callback {
        Some(callback) => unsafe { router.register_borrowed(callback) },
        None => router.clear(),
    }
}

/// Register an ownership-transferring log callback; null clears the sink
///
/// # Safety
/// `callback` must remain callable until replaced or cleared, must tolerate
/// concurrent calls, and must pass every pointer it receives to
/// `free_log_memory` (or the batch variant) exactly once.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn register_async_callback(callback: Option<TransferLogFn>) {
    let router = LogRouter::global();
    match callback {
        Some(callback) => unsafe { router.register_transfer(callback) },
        None => router.clear(),
    }
}

/// As `register_sync_callback`, also setting the threshold from a raw ordinal.
/// A null callback clears the sink and leaves the threshold alone.
///
/// # Safety
/// Same as `register_sync_callback`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn register_sync_callback_with_level(
    callback: Option<BorrowedLogFn>,
    level: i32,
) {
    let Some(callback) = callback else {
        LogRouter::global().clear();
        return;
    };
    install_with_raw_level(unsafe { BorrowedCallback::new(callback) }, level);
}

/// As `register_async_callback`, also setting the threshold from a raw ordinal.
/// A null callback clears the sink and leaves the threshold alone.
///
/// # Safety
/// Same as `register_async_callback`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn register_async_callback_with_level(
    callback: Option<TransferLogFn>,
    level: i32,
) {
    let Some(callback) = callback else {
        LogRouter::global().clear();
        return;
    };
    install_with_raw_level(unsafe { TransferCallback::new(callback) }, level);
}

/// Release one line delivered to an async callback. Null is ignored.
///
/// # Safety
/// `ptr` must be null or a line received by an async callback that has not
/// been released yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_log_memory(ptr: *mut c_char) {
    unsafe { sink::release_line(ptr) }
}

/// Release `count` lines delivered to an async callback. Null entries are
/// skipped; a null array or non-positive count does nothing.
///
/// # Safety
/// `ptrs` must point at `count` readable entries, each null or an unreleased
/// line received by an async callback, with no line listed twice.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_log_memory_batch(ptrs: *const *mut c_char, count: i32) {
    if ptrs.is_null() || count <= 0 {
        return;
    }
    unsafe {
        let lines = std::slice::from_raw_parts(ptrs, count as usize);
        sink::release_lines(lines);
    }
}
