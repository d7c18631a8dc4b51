//! The transport-independent event record and its metadata.

mod event;
mod metadata;

pub use event::{Event, EventType};
pub use metadata::{MetaValue, Metadata, META_HEADERS, META_KEY, META_PARTITION};
