/*!
Interop Runtime - C-ABI result envelopes and log routing for foreign hosts

Two halves share this library:

- result envelopes: every fallible operation exported to a foreign caller
  returns an `FfiResult` (success-heap, success-inline, or error) that the
  caller hands back to `free_result` exactly once;
- log routing: components log through a `StructuredLogger`; formatted lines
  reach a single foreign callback registered with `register_sync_callback`
  (borrowed buffers) or `register_async_callback` (transferred buffers,
  returned with `free_log_memory`).

Edition 2024 compliant with proper unsafe annotations.
*/

pub mod block;
pub mod config;
pub mod error;
pub mod format;
pub mod level;
pub mod logger;
pub mod payload;
pub mod result;
pub mod router;
pub mod sink;
#[cfg(feature = "tracing")]
pub mod trace;

// Re-export main types
pub use block::{ErasedBlock, OwnedBlock};
pub use config::LogConfig;
pub use error::{InteropError, InteropResult};
pub use level::Severity;
pub use logger::StructuredLogger;
pub use payload::{OwnedArray, OwnedStr, StringList};
pub use result::{
    BoundaryError, FfiError, FfiResult, InlineBits, InlineValue, Outcome, OutcomeView, ResultTag,
};
pub use router::LogRouter;
pub use sink::{BorrowedLogFn, LogSink, TransferLogFn};
#[cfg(feature = "tracing")]
pub use trace::RouterLayer;
