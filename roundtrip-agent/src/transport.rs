//! The pub/sub transport seam.
//!
//! Agents only need a connected channel that can attach subscribers and
//! publish payloads to every attached subscriber. Delivery, reconnection, and
//! fan-out are the transport's job.

use std::{fmt, future::Future, str::FromStr};

use thiserror::Error;

use crate::error::{AttachError, TransportError};

pub mod memory;


/// A named pub/sub channel on a connected transport.
pub trait Channel: Clone + Send + Sync + 'static {
    /// The subscriber handle returned by [`Channel::attach`].
    type Subscription: Subscription;

    /// Returns the channel name.
    fn name(&self) -> &str;

    /// Attaches a new subscriber to this channel.
    ///
    /// Payloads published after this future resolves are delivered to the
    /// returned subscription.
    fn attach(&self) -> impl Future<Output = Result<Self::Subscription, AttachError>> + Send;

    /// Publishes `payload` to every attached subscriber, including the publisher.
    ///
    /// Doesn't wait for delivery.
    fn publish(&self, payload: String) -> Result<(), TransportError>;
}

/// An attached subscriber to a [`Channel`].
///
/// Dropping the subscription detaches it.
pub trait Subscription: Send + 'static {
    /// Waits for the next payload.
    ///
    /// Returns `None` once the channel or its connection is closed.
    fn recv(&mut self) -> impl Future<Output = Option<String>> + Send;
}

/// The credential used to connect to a transport.
#[derive(Clone, Eq, PartialEq)]
pub struct ApiKey(String);

/// The error returned when parsing an empty [`ApiKey`].
#[derive(Copy, Clone, Debug, Error, Eq, PartialEq)]
#[error("API key must not be empty")]
pub struct EmptyApiKey;

impl ApiKey {
    /// Returns the secret key, for use by transport implementations.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiKey {
    type Err = EmptyApiKey;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let key = key.trim();

        if key.is_empty() {
            Err(EmptyApiKey)
        } else {
            Ok(ApiKey(key.to_string()))
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&"<redacted>").finish()
    }
}
