use std::collections::HashSet;

use super::{Event, EventId};

/// Events queued for push delivery during one host save transaction.
///
/// Owned by the transaction and handed to
/// [`Dispatcher::dispatch_batch`](super::Dispatcher::dispatch_batch) before
/// commit. Each event ID is staged at most once.
#[derive(Debug, Default)]
pub struct DispatchBatch {
    events: Vec<Event>,
    staged: HashSet<EventId>,
}

impl DispatchBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `event`; returns `false` if its ID is already staged
    pub(crate) fn stage(&mut self, event: Event) -> bool {
        if !self.staged.insert(event.id) {
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.staged.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(crate) fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}
