//! An in-process pub/sub transport.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{broadcast, watch};

use crate::{
    constants::{MAX_CHANNEL_CAPACITY, MIN_CHANNEL_CAPACITY},
    error::{AttachError, TransportError},
    transport::{ApiKey, Channel, Subscription},
};

/// An in-process pub/sub hub, which accepts connections using one API key.
///
/// Every channel is a broadcast queue: each payload is delivered to every
/// subscriber attached when it was published, in publish order.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    key: ApiKey,
    capacity: usize,
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
}

impl MemoryTransport {
    /// Returns a new hub that accepts connections using `key`, and buffers
    /// `capacity` payloads for each subscriber.
    ///
    /// The capacity is clamped to [`MIN_CHANNEL_CAPACITY`]..=[`MAX_CHANNEL_CAPACITY`].
    pub fn provision(key: ApiKey, capacity: usize) -> Self {
        if capacity > MAX_CHANNEL_CAPACITY {
            warn!(
                capacity,
                max = MAX_CHANNEL_CAPACITY,
                "channel capacity is limited, slow subscribers may skip payloads",
            );
        }

        Self {
            key,
            capacity: capacity.clamp(MIN_CHANNEL_CAPACITY, MAX_CHANNEL_CAPACITY),
            channels: Default::default(),
        }
    }

    /// Returns the number of payloads buffered for each subscriber.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Connects to this hub.
    ///
    /// Returns [`TransportError::ConnectionFailed`] if `key` is not the hub's key.
    pub async fn connect(&self, key: &ApiKey) -> Result<MemoryConnection, TransportError> {
        if *key != self.key {
            error!("transport rejected the API key");
            return Err(TransportError::ConnectionFailed);
        }

        let (closed, _) = watch::channel(false);
        debug!("connected to in-process transport");

        Ok(MemoryConnection {
            hub: self.clone(),
            closed: Arc::new(closed),
        })
    }

    /// Returns the sender for `name`, creating the channel if needed.
    fn sender(&self, name: &str) -> broadcast::Sender<String> {
        // # Correctness
        //
        // The lock is held briefly and never across an await point,
        // so a poisoned lock means another thread panicked while cloning a sender.
        let mut channels = self
            .channels
            .lock()
            .expect("channel map lock is never poisoned");

        channels
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

/// A connection to a [`MemoryTransport`].
///
/// Clones share the same connection, so closing any clone closes them all.
#[derive(Clone, Debug)]
pub struct MemoryConnection {
    hub: MemoryTransport,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryConnection {
    /// Returns the channel called `name` on this connection.
    pub fn channel(&self, name: impl Into<String>) -> MemoryChannel {
        let name = name.into();

        MemoryChannel {
            sender: self.hub.sender(&name),
            name,
            closed: self.closed.clone(),
        }
    }

    /// Closes this connection.
    ///
    /// Afterwards, attaching and publishing fail, and every subscription made
    /// through this connection ends.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            debug!("closed transport connection");
        }
    }

    /// Returns true if this connection has been closed.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

/// A channel on a [`MemoryConnection`].
#[derive(Clone, Debug)]
pub struct MemoryChannel {
    name: String,
    sender: broadcast::Sender<String>,
    closed: Arc<watch::Sender<bool>>,
}

impl MemoryChannel {
    /// Returns the number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Channel for MemoryChannel {
    type Subscription = MemorySubscription;

    fn name(&self) -> &str {
        &self.name
    }

    async fn attach(&self) -> Result<MemorySubscription, AttachError> {
        if *self.closed.borrow() {
            return Err(TransportError::AttachRejected {
                channel: self.name.clone(),
            });
        }

        Ok(MemorySubscription {
            channel: self.name.clone(),
            receiver: self.sender.subscribe(),
            closed: self.closed.subscribe(),
            _connection: self.closed.clone(),
        })
    }

    fn publish(&self, payload: String) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Closed);
        }

        // Publishing to a channel without subscribers is not an error.
        if self.sender.send(payload).is_err() {
            trace!(channel = %self.name, "published to a channel without subscribers");
        }

        Ok(())
    }
}

/// A subscriber attached to a [`MemoryChannel`].
#[derive(Debug)]
pub struct MemorySubscription {
    channel: String,
    receiver: broadcast::Receiver<String>,
    closed: watch::Receiver<bool>,

    /// Keeps the close signal alive, so `closed` only changes on an explicit close.
    _connection: Arc<watch::Sender<bool>>,
}

impl Subscription for MemorySubscription {
    async fn recv(&mut self) -> Option<String> {
        loop {
            let closed = *self.closed.borrow_and_update();
            if closed {
                return None;
            }

            tokio::select! {
                biased;

                _ = self.closed.changed() => continue,

                payload = self.receiver.recv() => match payload {
                    Ok(payload) => return Some(payload),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            channel = %self.channel,
                            skipped,
                            "subscriber fell behind, skipping the oldest payloads",
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }
}
