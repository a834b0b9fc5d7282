//! Activity events, delivery statuses and the dispatch pipeline.
//!
//! # Lifecycle
//!
//! - `Dispatcher::on_event_created` gates a new event on configuration and the
//!   recipient's channel preference, marks it `Pending` and stages it in the
//!   transaction's `DispatchBatch`.
//! - `Dispatcher::dispatch_batch` / `Dispatcher::on_event_persisting` render,
//!   resolve the recipient, deliver, and write the classified status back onto
//!   the event before the host commits it.

mod batch;
mod dispatcher;
mod status;
mod types;

pub use batch::DispatchBatch;
pub use dispatcher::{
    DispatchOutcome, Dispatcher, DispatcherStats, DispatcherStatsSnapshot, QueueDecision, SkipReason,
};
pub use status::DeliveryStatus;
pub use types::{DispatchRequest, Event, EventBuilder, EventId, EventPayload, Recipient, UserId};
