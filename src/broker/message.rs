//! Messages as the transports see them.

use crate::error::TransportError;

/// A message ready for a transport's send queue.
///
/// Built by the [translator](super::translate) once per publish call and
/// never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportMessage {
    topic: String,
    payload: Vec<u8>,
    partition: Option<i32>,
    key: Option<String>,
    headers: Option<Vec<(String, String)>>,
}

impl TransportMessage {
    pub(crate) fn new(
        topic: String,
        payload: Vec<u8>,
        partition: Option<i32>,
        key: Option<String>,
        headers: Option<Vec<(String, String)>>,
    ) -> Self {
        Self {
            topic,
            payload,
            partition,
            key,
            headers,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn partition(&self) -> Option<i32> {
        self.partition
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// `None` when the event carried no headers at all, `Some(vec![])` when
    /// it carried an empty header list.
    pub fn headers(&self) -> Option<&[(String, String)]> {
        self.headers.as_deref()
    }
}

/// A message read back from a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

/// Confirmation that the transport stored a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivered {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
}

/// A message the transport accepted into its queue but failed to deliver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub topic: String,
    pub partition: Option<i32>,
    pub key: Option<String>,
    pub error: TransportError,
}
