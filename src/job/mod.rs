//! Job module: one end-to-end indexing run per client
//!
//! # Components
//!
//! - `Orchestrator`: starts jobs and runs the resolve/submit loop
//! - `JobState`: the job lifecycle
//! - `ProgressEvent`: ordered events delivered to the subscriber
//! - `EventSink`: the bounded, backpressured event queue

mod channel;
mod check;
mod event;
mod orchestrator;
mod state;

pub use channel::{progress_channel, EventSink};
pub use check::CheckReport;
pub use event::{ClientMessage, EventKind, JobRequest, ProgressEvent, Totals};
pub use orchestrator::{JobHandle, JobSummary, Orchestrator};
pub use state::JobState;
