//! In-memory broker for testing and single-process scenarios.
//!
//! Implements the full [`Broker`] contract without an external server:
//! - Append-only per-stream logs with broker-assigned sequence numbers
//! - Publish deduplication within a configurable window
//! - Queue groups with competing consumers on worker threads
//! - Nack redelivery, last-message lookup by subject filter
//! - Inspection accessors for assertions in tests

use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{channel, TryRecvError};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::{Duration, Instant};

use super::{Broker, Delivery, DeliveryHandler, Outcome, PubAck, StoredMessage, Subscription};
use crate::error::QueueError;

const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default deduplication window, matching the usual broker default.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(120);

#[derive(Clone)]
struct StoredEntry {
    subject: String,
    sequence: u64,
    dedup_id: String,
    payload: Vec<u8>,
}

struct StreamState {
    subjects: Vec<String>,
    messages: Vec<StoredEntry>,
    next_sequence: u64,
    /// dedup id -> (publish time, original sequence)
    dedup: HashMap<String, (Instant, u64)>,
}

impl StreamState {
    fn new(subjects: Vec<String>) -> Self {
        Self {
            subjects,
            messages: Vec::new(),
            next_sequence: 1,
            dedup: HashMap::new(),
        }
    }
}

/// Pending messages shared by all members of one queue group.
struct GroupQueue {
    pending: Mutex<VecDeque<StoredEntry>>,
}

struct Inner {
    streams: RwLock<HashMap<String, StreamState>>,
    /// (subject, queue group) -> shared pending queue
    groups: Mutex<HashMap<(String, String), Arc<GroupQueue>>>,
    /// Dedup ids of acknowledged messages, in ack order.
    acked: Mutex<Vec<String>>,
    dedup_window: Duration,
}

/// In-memory [`Broker`] implementation.
///
/// Thread-safe; clones share the same state, so one instance can serve
/// publishers and subscribers across threads.
///
/// ## Example
///
/// ```
/// use streamq::InMemoryBroker;
/// use streamq::broker::Broker;
///
/// let broker = InMemoryBroker::new();
/// broker.add_stream("orders", &["orders.created"]);
///
/// let ack = broker.publish("orders.created", "order-1", b"{}".to_vec()).unwrap();
/// assert_eq!(ack.sequence, 1);
/// assert!(!ack.duplicate);
///
/// // Same dedup key inside the window collapses to the stored message.
/// let dup = broker.publish("orders.created", "order-1", b"{}".to_vec()).unwrap();
/// assert!(dup.duplicate);
/// assert_eq!(broker.stream_len("orders"), 1);
/// ```
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Create a broker with the default dedup window.
    pub fn new() -> Self {
        Self::with_dedup_window(DEFAULT_DEDUP_WINDOW)
    }

    /// Create a broker with a custom dedup window.
    pub fn with_dedup_window(window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                streams: RwLock::new(HashMap::new()),
                groups: Mutex::new(HashMap::new()),
                acked: Mutex::new(Vec::new()),
                dedup_window: window,
            }),
        }
    }

    /// Provision a stream bound to a set of subjects.
    ///
    /// Host applications provision streams before handing the broker to
    /// the typed adapters; publishing to an unbound subject fails with
    /// `Unavailable`.
    pub fn add_stream(&self, name: &str, subjects: &[&str]) {
        let mut streams = self.inner.streams.write().unwrap();
        streams.insert(
            name.to_string(),
            StreamState::new(subjects.iter().map(|s| s.to_string()).collect()),
        );
    }

    /// Number of messages stored on a stream.
    pub fn stream_len(&self, stream: &str) -> usize {
        self.inner
            .streams
            .read()
            .unwrap()
            .get(stream)
            .map_or(0, |s| s.messages.len())
    }

    /// Messages waiting for delivery to a queue group.
    pub fn pending(&self, subject: &str, queue_group: &str) -> usize {
        let groups = self.inner.groups.lock().unwrap();
        groups
            .get(&(subject.to_string(), queue_group.to_string()))
            .map_or(0, |q| q.pending.lock().unwrap().len())
    }

    /// Dedup ids of acknowledged messages, in ack order.
    pub fn acknowledged(&self) -> Vec<String> {
        self.inner.acked.lock().unwrap().clone()
    }

    fn group_queue(&self, subject: &str, queue_group: &str) -> Arc<GroupQueue> {
        // Lock order: streams before groups, same as publish. A group
        // registering concurrently with a publish then either seeds the
        // entry from the backlog or receives it from the fan-out, never
        // both.
        let streams = self.inner.streams.read().unwrap();
        let mut groups = self.inner.groups.lock().unwrap();
        let key = (subject.to_string(), queue_group.to_string());
        if let Some(queue) = groups.get(&key) {
            return Arc::clone(queue);
        }

        // First member of the group: seed the shared queue with the
        // stream backlog for this subject (durable from stream start).
        let queue = Arc::new(GroupQueue {
            pending: Mutex::new(VecDeque::new()),
        });
        {
            let mut pending = queue.pending.lock().unwrap();
            for state in streams.values() {
                if !state.subjects.iter().any(|s| s == subject) {
                    continue;
                }
                for entry in &state.messages {
                    if entry.subject == subject {
                        pending.push_back(entry.clone());
                    }
                }
            }
        }
        groups.insert(key, Arc::clone(&queue));
        queue
    }
}

impl Broker for InMemoryBroker {
    fn publish(
        &self,
        subject: &str,
        dedup_id: &str,
        payload: Vec<u8>,
    ) -> Result<PubAck, QueueError> {
        let mut streams = self.inner.streams.write().unwrap();
        let now = Instant::now();
        let window = self.inner.dedup_window;

        let (name, state) = streams
            .iter_mut()
            .find(|(_, s)| s.subjects.iter().any(|subj| subj == subject))
            .ok_or_else(|| {
                QueueError::Unavailable(format!("no stream bound to subject {}", subject))
            })?;

        state.dedup.retain(|_, (at, _)| now < *at + window);
        if let Some(&(_, sequence)) = state.dedup.get(dedup_id) {
            return Ok(PubAck {
                stream: name.clone(),
                sequence,
                duplicate: true,
            });
        }

        let sequence = state.next_sequence;
        state.next_sequence += 1;
        let entry = StoredEntry {
            subject: subject.to_string(),
            sequence,
            dedup_id: dedup_id.to_string(),
            payload,
        };
        state.messages.push(entry.clone());
        state.dedup.insert(dedup_id.to_string(), (now, sequence));
        let ack = PubAck {
            stream: name.clone(),
            sequence,
            duplicate: false,
        };

        // Fan the message out to every queue group on this subject; each
        // group's members compete for it. The stream lock is still held
        // (streams before groups everywhere), so a group registering
        // right now cannot see this entry in both its seed and the
        // fan-out.
        let groups = self.inner.groups.lock().unwrap();
        for ((subj, _), queue) in groups.iter() {
            if subj == subject {
                queue.pending.lock().unwrap().push_back(entry.clone());
            }
        }

        Ok(ack)
    }

    fn last_message(
        &self,
        stream: &str,
        subject_filter: &str,
    ) -> Result<StoredMessage, QueueError> {
        let streams = self.inner.streams.read().unwrap();
        let state = streams
            .get(stream)
            .ok_or_else(|| QueueError::Unavailable(format!("unknown stream {}", stream)))?;

        state
            .messages
            .iter()
            .rev()
            .find(|m| m.subject == subject_filter)
            .map(|m| StoredMessage {
                subject: m.subject.clone(),
                sequence: m.sequence,
                payload: m.payload.clone(),
            })
            .ok_or_else(|| QueueError::NotFound {
                stream: stream.to_string(),
                filter: subject_filter.to_string(),
            })
    }

    fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
        handler: DeliveryHandler,
    ) -> Result<Subscription, QueueError> {
        let queue = self.group_queue(subject, queue_group);
        let inner = Arc::clone(&self.inner);
        let (stop_tx, stop_rx) = channel();

        let worker = thread::spawn(move || loop {
            match stop_rx.try_recv() {
                Ok(()) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }

            let next = queue.pending.lock().unwrap().pop_front();
            let Some(entry) = next else {
                thread::sleep(POLL_INTERVAL);
                continue;
            };

            let outcome = Arc::new(Mutex::new(None));
            let slot = Arc::clone(&outcome);
            let delivery = Delivery::new(entry.subject.clone(), entry.payload.clone(), move |o| {
                *slot.lock().unwrap() = Some(o);
            });
            // A panicking callback must not kill the worker; it leaves
            // the delivery unsettled and falls through to redelivery.
            let _ = catch_unwind(AssertUnwindSafe(|| handler(delivery)));

            let settled = *outcome.lock().unwrap();
            match settled {
                Some(Outcome::Ack) => {
                    inner.acked.lock().unwrap().push(entry.dedup_id.clone());
                }
                // Nacked, panicked, or dropped without settling
                // (ack-wait expiry): requeue for redelivery.
                Some(Outcome::Nack) | None => {
                    queue.pending.lock().unwrap().push_back(entry);
                    thread::sleep(POLL_INTERVAL);
                }
            }
        });

        let mut worker = Some(worker);
        Ok(Subscription::new(move || {
            let _ = stop_tx.send(());
            if let Some(handle) = worker.take() {
                let _ = handle.join();
            }
        }))
    }
}
