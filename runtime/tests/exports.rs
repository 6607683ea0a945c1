//! The exported C functions, driven the way a foreign host would call them.
//! They all share the global router, so tests take `SERIAL` first.

use interop_runtime::LogRouter;
use interop_runtime::router::{
    free_log_memory, free_log_memory_batch, register_async_callback,
    register_async_callback_with_level, register_sync_callback,
    register_sync_callback_with_level,
};
use interop_runtime::{Severity, StructuredLogger};
use std::ffi::{CStr, c_char};
use std::sync::{Mutex, MutexGuard};

static SERIAL: Mutex<()> = Mutex::new(());
static SYNC_LINES: Mutex<Vec<String>> = Mutex::new(Vec::new());
static ASYNC_LINES: Mutex<Vec<usize>> = Mutex::new(Vec::new());

unsafe extern "C" fn on_sync_line(line: *const c_char) {
    let text = unsafe { CStr::from_ptr(line) }.to_string_lossy().into_owned();
    SYNC_LINES.lock().unwrap().push(text);
}

unsafe extern "C" fn on_async_line(line: *mut c_char) {
    ASYNC_LINES.lock().unwrap().push(line as usize);
}

/// Resets the global router and the captured lines when dropped
struct Session(#[allow(dead_code)] MutexGuard<'static, ()>);

fn session() -> Session {
    let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    LogRouter::global().reset();
    SYNC_LINES.lock().unwrap().clear();
    Session(guard)
}

impl Drop for Session {
    fn drop(&mut self) {
        LogRouter::global().reset();
        SYNC_LINES.lock().unwrap_or_else(|p| p.into_inner()).clear();
        let leftover: Vec<*mut c_char> = ASYNC_LINES
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .map(|p| p as *mut c_char)
            .collect();
        unsafe { free_log_memory_batch(leftover.as_ptr(), leftover.len() as i32) };
    }
}

fn sync_lines() -> Vec<String> {
    SYNC_LINES.lock().unwrap().clone()
}

#[test]
fn test_threshold_filters_lines() {
    let _session = session();
    unsafe { register_sync_callback_with_level(Some(on_sync_line), Severity::Warning as i32) };

    let logger = StructuredLogger::new("scanner");
    logger.finest("finest");
    logger.fine("fine");
    logger.info("info");
    assert!(sync_lines().is_empty());

    let line = line!() + 1;
    logger.warning("disk nearly full");
    logger.fatal("disk full");

    let lines = sync_lines();
    assert_eq!(lines.len(), 2);
    assert!(
        lines[0].ends_with(&format!(" [SCANNER] [WARN  ] exports@{line}: disk nearly full")),
        "{}",
        lines[0]
    );
    assert!(lines[1].contains(" [SCANNER] [FATAL ] exports@"));
    assert!(lines[1].ends_with(": disk full"));
}

#[test]
fn test_plain_registration_keeps_threshold() {
    let _session = session();
    LogRouter::global().set_threshold(Severity::Fatal);
    unsafe { register_sync_callback(Some(on_sync_line)) };
    assert_eq!(LogRouter::global().threshold(), Severity::Fatal);

    let logger = StructuredLogger::new("plain");
    logger.warning("filtered");
    logger.fatal("kept");
    assert_eq!(sync_lines().len(), 1);
}

#[test]
fn test_invalid_level_reports_and_keeps_threshold() {
    let _session = session();
    LogRouter::global().set_threshold(Severity::Info);
    unsafe { register_sync_callback_with_level(Some(on_sync_line), 9) };

    assert_eq!(LogRouter::global().threshold(), Severity::Info);
    let lines = sync_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" [LOGROUTER] [WARN  ] router@"), "{}", lines[0]);
    assert!(lines[0].contains("9"));

    StructuredLogger::new("after").info("still routed");
    assert_eq!(sync_lines().len(), 2);
}

#[test]
fn test_invalid_level_reported_above_kept_threshold() {
    let _session = session();
    LogRouter::global().set_threshold(Severity::Fatal);
    unsafe { register_sync_callback_with_level(Some(on_sync_line), -3) };

    assert_eq!(LogRouter::global().threshold(), Severity::Fatal);
    let lines = sync_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(" [LOGROUTER] [WARN  ] router@"), "{}", lines[0]);
    assert!(lines[0].contains("-3"));
    assert!(lines[0].ends_with("keeping threshold fatal"), "{}", lines[0]);

    // Ordinary warnings are still filtered by the kept threshold.
    StructuredLogger::new("after").warning("filtered");
    assert_eq!(sync_lines().len(), 1);
}

#[test]
fn test_invalid_level_reported_through_async_sink() {
    let _session = session();
    LogRouter::global().set_threshold(Severity::Fatal);
    unsafe { register_async_callback_with_level(Some(on_async_line), 5) };

    let ptrs: Vec<*mut c_char> = ASYNC_LINES
        .lock()
        .unwrap()
        .drain(..)
        .map(|p| p as *mut c_char)
        .collect();
    assert_eq!(ptrs.len(), 1);
    let text = unsafe { CStr::from_ptr(ptrs[0]) }.to_str().unwrap().to_owned();
    assert!(text.contains("[WARN  ]") && text.contains('5'), "{text}");
    unsafe { free_log_memory_batch(ptrs.as_ptr(), ptrs.len() as i32) };
}

#[test]
fn test_null_callback_clears_sink() {
    let _session = session();
    unsafe { register_sync_callback_with_level(Some(on_sync_line), Severity::Finest as i32) };
    let logger = StructuredLogger::new("clear");
    logger.info("before");

    unsafe { register_sync_callback(None) };
    logger.fatal("after");
    assert!(!LogRouter::global().has_sink());
    assert_eq!(sync_lines().len(), 1);

    // The threshold survives a clearing call with a level.
    unsafe { register_sync_callback_with_level(None, Severity::Fatal as i32) };
    assert_eq!(LogRouter::global().threshold(), Severity::Finest);
}

#[test]
fn test_async_lines_are_owned_copies() {
    let _session = session();
    unsafe { register_async_callback_with_level(Some(on_async_line), Severity::Info as i32) };

    let logger = StructuredLogger::new("async");
    logger.fine("filtered");
    logger.info("first");
    logger.warning("second");

    let ptrs: Vec<*mut c_char> = ASYNC_LINES
        .lock()
        .unwrap()
        .drain(..)
        .map(|p| p as *mut c_char)
        .collect();
    assert_eq!(ptrs.len(), 2);
    assert_ne!(ptrs[0], ptrs[1]);

    // Lines stay readable after the sink is gone and are freed one by one.
    unsafe { register_async_callback(None) };
    let first = unsafe { CStr::from_ptr(ptrs[0]) }.to_str().unwrap();
    let second = unsafe { CStr::from_ptr(ptrs[1]) }.to_str().unwrap();
    assert!(first.ends_with(": first"));
    assert!(second.contains("[ASYNC] [WARN  ]"));
    for p in ptrs {
        unsafe { free_log_memory(p) };
    }
}

#[test]
fn test_free_functions_tolerate_null() {
    let _session = session();
    unsafe {
        free_log_memory(std::ptr::null_mut());
        free_log_memory_batch(std::ptr::null(), 4);
        free_log_memory_batch([std::ptr::null_mut(); 3].as_ptr(), 3);
        free_log_memory_batch([std::ptr::null_mut(); 3].as_ptr(), -1);
    }
}
