use std::sync::Arc;
use std::time::Instant;

use crate::notification::Dispatcher;

#[derive(Clone)]
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            start_time: Instant::now(),
        }
    }
}
