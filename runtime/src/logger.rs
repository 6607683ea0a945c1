/*!
Structured Logger - per-module front end to the log router

A logger is created once per component with a fixed module name and then
shared freely. Each call captures the caller's source file and line, checks
the router's gate, and only then formats:

```text
14:02:07.311 [SCANNER] [INFO  ] walk@88: visited 412 entries
```
*/

use crate::format::{Record, site_name};
use crate::level::Severity;
use crate::router::LogRouter;
use std::fmt;
use std::panic::Location;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructuredLogger {
    module: Box<str>,
}

impl StructuredLogger {
    /// Logger tagged with `module`, upper-cased
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_uppercase().into_boxed_str(),
        }
    }

    /// Logger tagged with the short name of `T`: `crate::scan::Walker<u8>`
    /// becomes `WALKER`.
    pub fn for_type<T: ?Sized>() -> Self {
        Self::new(short_type_name(std::any::type_name::<T>()))
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Log through the global router
    #[track_caller]
    pub fn log(&self, level: Severity, message: fmt::Arguments<'_>) {
        self.log_to(LogRouter::global(), level, message);
    }

    /// Log through a specific router
    #[track_caller]
    pub fn log_to(&self, router: &LogRouter, level: Severity, message: fmt::Arguments<'_>) {
        if !router.enabled(level) {
            return;
        }
        let caller = Location::caller();
        router.emit(&Record {
            level,
            module: &self.module,
            site: site_name(caller.file()),
            line: caller.line(),
            message,
        });
    }

    #[track_caller]
    pub fn finest(&self, message: &str) {
        self.log(Severity::Finest, format_args!("{message}"));
    }

    #[track_caller]
    pub fn fine(&self, message: &str) {
        self.log(Severity::Fine, format_args!("{message}"));
    }

    #[track_caller]
    pub fn info(&self, message: &str) {
        self.log(Severity::Info, format_args!("{message}"));
    }

    #[track_caller]
    pub fn warning(&self, message: &str) {
        self.log(Severity::Warning, format_args!("{message}"));
    }

    #[track_caller]
    pub fn fatal(&self, message: &str) {
        self.log(Severity::Fatal, format_args!("{message}"));
    }
}

fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Log at `Finest` with `format!`-style arguments:
/// `log_finest!(logger, "visited {}", path)`
#[macro_export]
macro_rules! log_finest {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::Severity::Finest, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_fine {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::Severity::Fine, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::Severity::Info, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::Severity::Warning, format_args!($($arg)+))
    };
}

#[macro_export]
macro_rules! log_fatal {
    ($logger:expr, $($arg:tt)+) => {
        $logger.log($crate::Severity::Fatal, format_args!($($arg)+))
    };
}
