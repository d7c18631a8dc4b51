use std::sync::{Arc, Mutex, PoisonError};

use tracing::info;

use super::Publisher;
use crate::error::BusError;
use crate::event::Event;

/// A publisher that only logs events, or appends them to a buffer.
///
/// Needs no transport: connecting and disconnecting do nothing, and every
/// valid event is accepted.
#[derive(Default)]
pub struct LogPublisher {
    buffer: Option<Arc<Mutex<Vec<String>>>>,
}

impl LogPublisher {
    pub fn new() -> Self {
        LogPublisher { buffer: None }
    }

    pub fn with_buffer(buffer: Arc<Mutex<Vec<String>>>) -> Self {
        LogPublisher {
            buffer: Some(buffer),
        }
    }
}

impl Publisher for LogPublisher {
    fn connect(&self) -> Result<(), BusError> {
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BusError> {
        Ok(())
    }

    fn publish(&self, topic: &str, event: &Event) -> Result<(), BusError> {
        event.validate()?;

        info!(topic, event_id = event.id(), event_type = %event.event_type(), "publish");
        if let Some(buffer) = &self.buffer {
            buffer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(format!("{topic} {event}"));
        }
        Ok(())
    }
}
