pub mod broker;
pub mod bus;
mod error;
mod event;

pub use broker::{ConnectionState, DeliveryObserver, DeliveryStats};
pub use bus::{Bus, EventHandler, LogPublisher, Publisher, Subscriber};
pub use error::{
    BusError, ConfigError, HandlerError, MappingError, TransportError, ValidationError,
    HEADERS_FORMAT_EXAMPLE,
};
pub use event::{Event, EventType, MetaValue, Metadata, META_HEADERS, META_KEY, META_PARTITION};

#[cfg(feature = "memory")]
pub use broker::memory::{MemoryBroker, MemoryConfig, MemoryPublisher, MemorySubscriber};

#[cfg(feature = "kafka")]
pub use broker::kafka::{KafkaConfig, KafkaPublisher, KafkaSubscriber};
