//! Layer routing `tracing` events into the foreign log sink
//!
//! Levels map TRACE→Finest, DEBUG→Fine, INFO→Info, WARN→Warning,
//! ERROR→Fatal. The module tag is the last segment of the event target,
//! upper-cased; the site is the stem of the source file.

// External dependencies
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

// Internal crates
use crate::format::{Record, site_name};
use crate::level::Severity;
use crate::router::LogRouter;

use std::fmt::{self, Write as _};

/// Layer that forwards every enabled event to a `LogRouter`
#[derive(Debug, Clone, Copy)]
pub struct RouterLayer {
    router: &'static LogRouter,
}

impl RouterLayer {
    /// Forward to the global router
    pub fn new() -> Self {
        Self::with_router(LogRouter::global())
    }

    pub fn with_router(router: &'static LogRouter) -> Self {
        Self { router }
    }
}

impl Default for RouterLayer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn severity_of(level: &Level) -> Severity {
    match *level {
        Level::TRACE => Severity::Finest,
        Level::DEBUG => Severity::Fine,
        Level::INFO => Severity::Info,
        Level::WARN => Severity::Warning,
        Level::ERROR => Severity::Fatal,
    }
}

/// `message` first, then `key=value` for the remaining fields
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for RouterLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = severity_of(metadata.level());
        if !self.router.enabled(level) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let target = metadata.target();
        let module = target.rsplit("::").next().unwrap_or(target).to_uppercase();
        let message = visitor.message.trim_start();
        let fields = if message.is_empty() {
            visitor.fields.trim_start()
        } else {
            visitor.fields.as_str()
        };

        self.router.emit(&Record {
            level,
            module: &module,
            site: metadata.file().map(site_name).unwrap_or("unknown"),
            line: metadata.line().unwrap_or(0),
            message: format_args!("{message}{fields}"),
        });
    }
}
