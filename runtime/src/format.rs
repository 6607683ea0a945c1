/*!
Line Formatting

`HH:MM:SS.mmm [MODULE] [TAG   ] site@line: message`

Lines are rendered into a per-thread buffer that is reused across calls, so
steady-state emission to a borrowed sink does not touch the allocator. The
buffer is NUL-terminated in place and interior NUL bytes are dropped while
writing, which lets it be handed out as a `CStr` directly.
*/

use crate::level::Severity;
use std::cell::RefCell;
use std::ffi::CStr;
use std::fmt::{self, Write as _};
use time::OffsetDateTime;

const INITIAL_LINE_CAPACITY: usize = 256;

/// Capacity the per-thread buffer may keep between lines. An oversized line
/// is still rendered whole, then the buffer is shrunk back.
const MAX_RETAINED_LINE_CAPACITY: usize = 4 * 1024;

thread_local! {
    static LINE: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

/// Everything that goes into one line
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub level: Severity,
    pub module: &'a str,
    pub site: &'a str,
    pub line: u32,
    pub message: fmt::Arguments<'a>,
}

/// `fmt::Write` over a byte buffer that drops NUL bytes
struct NulFree<'a>(&'a mut Vec<u8>);

impl fmt::Write for NulFree<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if s.as_bytes().contains(&0) {
            self.0.extend(s.bytes().filter(|&b| b != 0));
        } else {
            self.0.extend_from_slice(s.as_bytes());
        }
        Ok(())
    }
}

/// Render `record` into `buf`, replacing its contents. The result ends with
/// exactly one NUL byte.
pub fn render(buf: &mut Vec<u8>, now: OffsetDateTime, record: &Record<'_>) {
    buf.clear();
    if buf.capacity() == 0 {
        buf.reserve(INITIAL_LINE_CAPACITY);
    }
    let mut out = NulFree(&mut *buf);
    // Writing into a Vec cannot fail.
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}.{:03} [{}] {} {}@{}: {}",
        now.hour(),
        now.minute(),
        now.second(),
        now.millisecond(),
        record.module,
        record.level.tag(),
        record.site,
        record.line,
        record.message,
    );
    buf.push(0);
}

/// Render `record` and pass the finished line to `deliver`.
///
/// Uses the thread's reusable buffer; a nested call made from inside
/// `deliver` (a sink that logs) or during thread teardown renders into a
/// temporary buffer instead.
pub fn with_line<R>(
    now: OffsetDateTime,
    record: &Record<'_>,
    deliver: impl FnOnce(&CStr) -> R,
) -> Option<R> {
    let mut deliver = Some(deliver);
    let reused = LINE.try_with(|cell| {
        let mut buf = cell.try_borrow_mut().ok()?;
        render(&mut buf, now, record);
        let result = CStr::from_bytes_with_nul(&buf)
            .ok()
            .and_then(|line| deliver.take().map(|f| f(line)));
        trim_retained(&mut buf);
        result
    });
    match reused {
        Ok(Some(result)) => Some(result),
        _ => {
            let deliver = deliver.take()?;
            let mut buf = Vec::new();
            render(&mut buf, now, record);
            let line = CStr::from_bytes_with_nul(&buf).ok()?;
            Some(deliver(line))
        }
    }
}

fn trim_retained(buf: &mut Vec<u8>) {
    if buf.capacity() > MAX_RETAINED_LINE_CAPACITY {
        buf.clear();
        buf.shrink_to(MAX_RETAINED_LINE_CAPACITY);
    }
}

/// Short name for a source file: its stem, or the path itself
pub fn site_name(file: &str) -> &str {
    std::path::Path::new(file)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file)
}
