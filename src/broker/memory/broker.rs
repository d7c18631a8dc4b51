use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::MemoryConfig;
use crate::broker::message::{Delivered, Record, TransportMessage};
use crate::error::{ConfigError, TransportError};

/// In-process, partitioned, append-only log broker.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Topics are created on first write with a fixed partition count
/// - Each partition has its own offset sequence
/// - Readers track their own position in a topic's append order
/// - Outages can be simulated with [`set_available`](Self::set_available)
///
/// ## Example
///
/// ```
/// use event_broker::broker::memory::MemoryBroker;
/// use event_broker::bus::Publisher;
/// use event_broker::{Event, EventType};
///
/// let broker = MemoryBroker::default();
/// let publisher = broker.publisher();
/// publisher.connect().unwrap();
///
/// let event = Event::with_string_payload("evt-1", EventType::Operate, r#"{"id":"123"}"#);
/// publisher.publish("audit", &event).unwrap();
/// publisher.disconnect().unwrap();
///
/// assert_eq!(broker.len("audit"), 1);
/// ```
#[derive(Clone)]
pub struct MemoryBroker {
    shared: Arc<Shared>,
}

struct Shared {
    config: MemoryConfig,
    topics: Mutex<HashMap<String, TopicLog>>,
    appended: Condvar,
    available: AtomicBool,
    round_robin: AtomicUsize,
}

struct TopicLog {
    records: Vec<Record>,
    next_offsets: Vec<i64>,
}

impl TopicLog {
    fn new(partitions: i32) -> Self {
        Self {
            records: Vec::new(),
            next_offsets: vec![0; partitions.max(0) as usize],
        }
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::with_valid_config(MemoryConfig::default())
    }
}

impl MemoryBroker {
    /// Create a broker after validating `config`.
    pub fn new(config: MemoryConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: MemoryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                topics: Mutex::new(HashMap::new()),
                appended: Condvar::new(),
                available: AtomicBool::new(true),
                round_robin: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.shared.config
    }

    /// Take the broker offline or bring it back.
    ///
    /// While offline, connects and polls fail and queued messages are
    /// reported as failed deliveries.
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::Release);
        self.shared.appended.notify_all();
    }

    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::Acquire)
    }

    pub(crate) fn check_available(&self) -> Result<(), TransportError> {
        if self.is_available() {
            Ok(())
        } else {
            Err(TransportError::Unavailable(self.shared.config.name.clone()))
        }
    }

    /// Store a message and return where it landed.
    pub(crate) fn append(&self, message: &TransportMessage) -> Result<Delivered, TransportError> {
        self.check_available()?;

        let partitions = self.shared.config.partitions;
        let partition = match message.partition() {
            Some(p) if (0..partitions).contains(&p) => p,
            Some(p) => {
                return Err(TransportError::UnknownPartition {
                    topic: message.topic().to_string(),
                    partition: p,
                })
            }
            None => self.pick_partition(message.key()),
        };

        let mut topics = self.lock();
        let log = topics
            .entry(message.topic().to_string())
            .or_insert_with(|| TopicLog::new(partitions));

        let offset = log.next_offsets[partition as usize];
        log.next_offsets[partition as usize] += 1;
        log.records.push(Record {
            topic: message.topic().to_string(),
            partition,
            offset,
            key: message.key().map(str::to_string),
            headers: message.headers().map(<[_]>::to_vec).unwrap_or_default(),
            payload: message.payload().to_vec(),
        });
        drop(topics);
        self.shared.appended.notify_all();

        Ok(Delivered {
            topic: message.topic().to_string(),
            partition,
            offset,
            key: message.key().map(str::to_string),
        })
    }

    /// Keyed messages hash to a stable partition; the rest rotate.
    fn pick_partition(&self, key: Option<&str>) -> i32 {
        let partitions = self.shared.config.partitions as u64;
        let slot = match key {
            Some(key) => {
                let mut hasher = DefaultHasher::new();
                key.hash(&mut hasher);
                hasher.finish() % partitions
            }
            None => self.shared.round_robin.fetch_add(1, Ordering::Relaxed) as u64 % partitions,
        };
        slot as i32
    }

    /// Number of records in a topic's append order, i.e. the next read position.
    pub fn len(&self, topic: &str) -> usize {
        self.lock().get(topic).map_or(0, |log| log.records.len())
    }

    pub fn is_empty(&self, topic: &str) -> bool {
        self.len(topic) == 0
    }

    /// All records of a topic in append order.
    pub fn records(&self, topic: &str) -> Vec<Record> {
        self.lock()
            .get(topic)
            .map(|log| log.records.clone())
            .unwrap_or_default()
    }

    /// Known topics, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Wait up to `timeout` for the record at `position` of `topic`.
    pub(crate) fn fetch(
        &self,
        topic: &str,
        position: usize,
        timeout: Duration,
    ) -> Result<Option<Record>, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut topics = self.lock();

        loop {
            self.check_available()?;

            if let Some(record) = topics.get(topic).and_then(|log| log.records.get(position)) {
                return Ok(Some(record.clone()));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            topics = self
                .shared
                .appended
                .wait_timeout(topics, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TopicLog>> {
        self.shared.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
