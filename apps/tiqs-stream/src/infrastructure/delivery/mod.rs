//! Delivery Queues
//!
//! Bounded queues that carry decoded ticks and stream errors from the
//! receive loop to the consumer.
//!
//! # Policy
//!
//! Publishing never blocks. When a queue is full the new item is dropped
//! and counted; items already queued are kept. A live quote feed prefers a
//! fresh tick later over a stale one now.
//!
//! The error type is left to the caller so the queues know nothing about
//! the transport that feeds them.
//!
//! The queues close when every publisher has been dropped. The client holds
//! one publisher and its receive loop holds a clone, so the consumer streams
//! end only after the loop has stopped.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

use crate::QueueSettings;
use crate::domain::streaming::Tick;
use crate::infrastructure::metrics::{self, QueueKind};

/// Default tick queue capacity.
pub const DEFAULT_TICK_CAPACITY: usize = 1_000;

/// Default error queue capacity.
pub const DEFAULT_ERROR_CAPACITY: usize = 100;

// =============================================================================
// Configuration
// =============================================================================

/// Capacities of the delivery queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Capacity of the tick queue.
    pub tick_capacity: usize,
    /// Capacity of the error queue.
    pub error_capacity: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            tick_capacity: DEFAULT_TICK_CAPACITY,
            error_capacity: DEFAULT_ERROR_CAPACITY,
        }
    }
}

impl From<QueueSettings> for DeliveryConfig {
    fn from(settings: QueueSettings) -> Self {
        Self {
            tick_capacity: settings.tick_capacity,
            error_capacity: settings.error_capacity,
        }
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Outcome of a non-blocking publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The item was queued.
    Delivered,
    /// The queue was full; the item was discarded.
    Dropped,
    /// The consumer is gone; the item was discarded.
    Closed,
}

impl Delivery {
    /// Whether the item was queued.
    #[must_use]
    pub const fn is_delivered(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Producer side of the delivery queues.
#[derive(Debug)]
pub struct DeliveryPublisher<E> {
    ticks: mpsc::Sender<Tick>,
    errors: mpsc::Sender<E>,
}

impl<E> Clone for DeliveryPublisher<E> {
    fn clone(&self) -> Self {
        Self {
            ticks: self.ticks.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<E: fmt::Display> DeliveryPublisher<E> {
    /// Try to queue a tick without waiting.
    pub fn try_publish_tick(&self, tick: Tick) -> Delivery {
        match self.ticks.try_send(tick) {
            Ok(()) => {
                metrics::record_delivered(QueueKind::Ticks);
                Delivery::Delivered
            }
            Err(TrySendError::Full(tick)) => {
                tracing::warn!(token = tick.token, "Tick queue is full, dropping tick");
                metrics::record_dropped(QueueKind::Ticks);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Tick stream dropped by consumer, discarding tick");
                Delivery::Closed
            }
        }
    }

    /// Try to queue an error without waiting.
    pub fn try_publish_error(&self, error: E) -> Delivery {
        match self.errors.try_send(error) {
            Ok(()) => {
                metrics::record_delivered(QueueKind::Errors);
                Delivery::Delivered
            }
            Err(TrySendError::Full(error)) => {
                tracing::warn!(error = %error, "Error queue is full, dropping error");
                metrics::record_dropped(QueueKind::Errors);
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Error stream dropped by consumer, discarding error");
                Delivery::Closed
            }
        }
    }
}

// =============================================================================
// Consumer Streams
// =============================================================================

/// Read-only consumer end of a delivery queue.
///
/// Yields `None` once the queue is closed and drained.
#[derive(Debug)]
pub struct FeedStream<T> {
    inner: ReceiverStream<T>,
}

/// Stream of decoded ticks.
pub type TickStream = FeedStream<Tick>;

impl<T> FeedStream<T> {
    fn new(rx: mpsc::Receiver<T>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Wait for the next item.
    pub async fn recv(&mut self) -> Option<T> {
        self.inner.as_mut().recv().await
    }

    /// Take the next item if one is queued.
    ///
    /// # Errors
    ///
    /// Returns `Empty` when nothing is queued and `Disconnected` once the
    /// queue is closed and drained.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        self.inner.as_mut().try_recv()
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.as_ref().is_empty()
    }

    /// Whether the producers are gone (queued items may remain).
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.as_ref().is_closed()
    }
}

impl<T> Stream for FeedStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// Create the delivery queues.
#[must_use]
pub fn channel<E>(config: DeliveryConfig) -> (DeliveryPublisher<E>, TickStream, FeedStream<E>) {
    let (ticks_tx, ticks_rx) = mpsc::channel(config.tick_capacity.max(1));
    let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity.max(1));

    (
        DeliveryPublisher {
            ticks: ticks_tx,
            errors: errors_tx,
        },
        FeedStream::new(ticks_rx),
        FeedStream::new(errors_rx),
    )
}

// =============================================================================
// Tests
// =============================================================================
