//! In-process topic system
//!
//! Each topic is an mpsc channel feeding a dispatcher task that fans messages
//! out over a broadcast channel. Publishers are bounded by a byte budget so a
//! stalled consumer produces `BufferFull` instead of unbounded growth.
//!
//! Topics used by the poller:
//! - `triggers`: `TriggerEvent`s that start a query pass
//! - `statistics`: `StatisticBatch`es produced by a pass

mod error;

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

pub use error::TopicError;

use crate::core::constants::{
    DEFAULT_TOPIC_BUFFER_SIZE, DEFAULT_TOPIC_CHANNEL_CAPACITY, ENV_TOPIC_BUFFER_SIZE,
    ENV_TOPIC_CHANNEL_CAPACITY,
};

// ============================================================================
// TOPIC MESSAGE TRAIT
// ============================================================================

/// Trait for messages that can be published to topics
pub trait TopicMessage: Clone + Send + Sync + 'static {
    /// Estimate message size in bytes for backpressure
    fn size_bytes(&self) -> usize;
}

// ============================================================================
// TOPIC CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct TopicConfig {
    pub buffer_size: usize,
    pub channel_capacity: usize,
}

impl Default for TopicConfig {
    fn default() -> Self {
        let buffer_size = std::env::var(ENV_TOPIC_BUFFER_SIZE)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOPIC_BUFFER_SIZE);

        let channel_capacity = std::env::var(ENV_TOPIC_CHANNEL_CAPACITY)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TOPIC_CHANNEL_CAPACITY);

        Self {
            buffer_size,
            channel_capacity,
        }
    }
}

// ============================================================================
// PUBLISHER / SUBSCRIBER
// ============================================================================

/// Publisher handle - clone and share across producers
#[derive(Clone, Debug)]
pub struct Publisher<T: TopicMessage> {
    tx: mpsc::Sender<T>,
    buffer_bytes: Arc<AtomicUsize>,
    max_bytes: usize,
}

impl<T: TopicMessage> Publisher<T> {
    /// Publish message (returns error if buffer full)
    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        let msg_size = msg.size_bytes();

        // Reserve buffer space
        loop {
            let current = self.buffer_bytes.load(Ordering::Relaxed);
            if current + msg_size > self.max_bytes {
                return Err(TopicError::BufferFull);
            }
            if self
                .buffer_bytes
                .compare_exchange(
                    current,
                    current + msg_size,
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                break;
            }
        }

        self.tx.try_send(msg).map_err(|e| {
            self.buffer_bytes.fetch_sub(msg_size, Ordering::SeqCst);
            match e {
                mpsc::error::TrySendError::Full(_) => TopicError::BufferFull,
                mpsc::error::TrySendError::Closed(_) => TopicError::ChannelClosed,
            }
        })
    }
}

pub struct Subscriber<T: TopicMessage> {
    rx: broadcast::Receiver<T>,
}

impl<T: TopicMessage> Subscriber<T> {
    pub async fn recv(&mut self) -> Result<T, TopicError> {
        self.rx.recv().await.map_err(|e| e.into())
    }

    /// Non-blocking receive; `Ok(None)` when nothing is queued
    pub fn try_recv(&mut self) -> Result<Option<T>, TopicError> {
        match self.rx.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// TOPIC SERVICE
// ============================================================================

struct TopicInner<T: TopicMessage> {
    broadcast_tx: broadcast::Sender<T>,
    publisher: Publisher<T>,
}

/// Type-erased topic storage
trait AnyTopic: Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T: TopicMessage> AnyTopic for TopicInner<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

type TopicMap = HashMap<String, (TypeId, Arc<dyn AnyTopic>)>;

struct DispatcherEntry {
    handle: JoinHandle<()>,
    shutdown_tx: oneshot::Sender<()>,
}

/// Central topic service - manages all topics
pub struct TopicService {
    topics: RwLock<TopicMap>,
    dispatchers: RwLock<Vec<DispatcherEntry>>,
    default_config: TopicConfig,
}

impl TopicService {
    pub fn new() -> Self {
        Self::with_config(TopicConfig::default())
    }

    pub fn with_config(config: TopicConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            dispatchers: RwLock::new(Vec::new()),
            default_config: config,
        }
    }

    /// Create a topic or get the existing one with the same message type
    pub fn topic<T: TopicMessage>(&self, name: &str) -> Result<Topic<T>, TopicError> {
        let type_id = TypeId::of::<T>();

        // Hold write lock so two callers cannot both create the topic
        let mut topics = self.topics.write();

        if let Some((existing_type, topic)) = topics.get(name) {
            return match topic.as_any().downcast_ref::<TopicInner<T>>() {
                Some(inner) if *existing_type == type_id => Ok(Topic {
                    publisher: inner.publisher.clone(),
                    broadcast_tx: inner.broadcast_tx.clone(),
                }),
                _ => Err(TopicError::TypeMismatch(name.to_string())),
            };
        }

        let config = &self.default_config;
        let (mpsc_tx, mpsc_rx) = mpsc::channel(config.channel_capacity);
        let (broadcast_tx, _) = broadcast::channel(config.channel_capacity);
        let buffer_bytes = Arc::new(AtomicUsize::new(0));

        let publisher = Publisher {
            tx: mpsc_tx,
            buffer_bytes: buffer_bytes.clone(),
            max_bytes: config.buffer_size,
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle =
            Self::start_dispatcher(mpsc_rx, broadcast_tx.clone(), buffer_bytes, shutdown_rx);
        self.dispatchers.write().push(DispatcherEntry {
            handle,
            shutdown_tx,
        });

        let inner = TopicInner {
            broadcast_tx: broadcast_tx.clone(),
            publisher: publisher.clone(),
        };
        topics.insert(name.to_string(), (type_id, Arc::new(inner)));
        tracing::debug!(topic = name, "Topic created");

        Ok(Topic {
            publisher,
            broadcast_tx,
        })
    }

    fn start_dispatcher<T: TopicMessage>(
        mut rx: mpsc::Receiver<T>,
        broadcast_tx: broadcast::Sender<T>,
        buffer_bytes: Arc<AtomicUsize>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = &mut shutdown_rx => {
                        // Drain remaining messages before exiting
                        while let Ok(msg) = rx.try_recv() {
                            let msg_size = msg.size_bytes();
                            let _ = broadcast_tx.send(msg);
                            buffer_bytes.fetch_sub(msg_size, Ordering::SeqCst);
                        }
                        break;
                    }
                    msg = rx.recv() => {
                        match msg {
                            Some(msg) => {
                                let msg_size = msg.size_bytes();
                                let _ = broadcast_tx.send(msg);
                                buffer_bytes.fetch_sub(msg_size, Ordering::SeqCst);
                            }
                            None => break,
                        }
                    }
                }
            }
        })
    }

    /// Drain every dispatcher and wait for it to finish
    pub async fn shutdown(&self) {
        let entries: Vec<_> = {
            let mut guard = self.dispatchers.write();
            std::mem::take(&mut *guard)
        };

        let mut handles = Vec::with_capacity(entries.len());
        for entry in entries {
            let _ = entry.shutdown_tx.send(());
            handles.push(entry.handle);
        }
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Default for TopicService {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TOPIC HANDLE
// ============================================================================

#[derive(Clone)]
pub struct Topic<T: TopicMessage> {
    publisher: Publisher<T>,
    broadcast_tx: broadcast::Sender<T>,
}

impl<T: TopicMessage> Topic<T> {
    pub fn publisher(&self) -> Publisher<T> {
        self.publisher.clone()
    }

    pub fn subscribe(&self) -> Subscriber<T> {
        Subscriber {
            rx: self.broadcast_tx.subscribe(),
        }
    }

    pub fn publish(&self, msg: T) -> Result<(), TopicError> {
        self.publisher.publish(msg)
    }
}
