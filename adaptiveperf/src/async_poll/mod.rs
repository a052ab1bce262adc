//! Background polling of slow telemetry reads.
//!
//! Vendor telemetry calls are too slow to run on the frame thread, so each
//! reading is wrapped in an [`AsyncValue`] that is refreshed on a dedicated
//! [`TelemetryWorker`] and adopted on the next poll.
//!
//! # Architecture
//!
//! ```text
//!  frame thread                         worker thread (one per domain)
//!  ────────────                         ──────────────────────────────
//!  AsyncValue::poll(now)
//!    ├─ completed read? ──adopt──┐
//!    └─ interval elapsed? ──────────job──► FIFO queue ──► read() ──┐
//!                                │                                 │
//!                                └──────── one-shot result ◄───────┘
//! ```
//!
//! The frame thread only blocks in [`AsyncValue::sync_poll`], which is
//! reserved for startup and resume.

mod value;
mod worker;

pub use value::{AsyncValue, ReadFn};
pub use worker::{Job, TelemetryWorker, WorkerHooks};
