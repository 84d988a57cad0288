//! Completion handle for a submitted batch.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;

use crate::{
    error::{Error, Status},
    pipeline::flight::{Flight, Payload},
    transport::Transport,
};

/// Handle to an in-flight or completed batch.
///
/// A `Tracker` is produced by [`Client::submit`](crate::Client::submit) and
/// owns the batch plus every buffer decoded from the server's responses.
/// Completion is observable through [`wait`](Self::wait); individual results
/// become readable in request order as responses arrive, through
/// [`result`](Self::result).
///
/// Retire the tracker with [`Client::retire`](crate::Client::retire) once
/// its results have been read: retirement joins the background receiver,
/// releases every owned buffer, and returns the session to the client for
/// the next submission. Because retirement consumes the tracker, a second
/// retirement cannot be expressed.
#[derive(Debug)]
pub struct Tracker {
    flight: Arc<Flight>,
    handle: JoinHandle<Transport>,
}

impl Tracker {
    pub(crate) fn new(flight: Arc<Flight>, handle: JoinHandle<Transport>) -> Self {
        Self { flight, handle }
    }

    /// Waits for the batch to complete and returns its aggregate outcome:
    /// the first fatal error observed by the receiver, or success.
    ///
    /// A zero `timeout` waits indefinitely. A positive `timeout` bounds the
    /// wait; on expiry the call fails with a timeout [`Error::Io`] while the
    /// receiver keeps running, so a later `wait` or retire still works.
    ///
    /// A successful aggregate does not imply every slot succeeded: semantic
    /// statuses such as key-not-found live in the individual slots.
    pub async fn wait(&self, timeout: Duration) -> Result<(), Error> {
        if timeout.is_zero() {
            self.flight.completed().await;
        } else if tokio::time::timeout(timeout, self.flight.completed())
            .await
            .is_err()
        {
            return Err(Error::timed_out());
        }

        match self.flight.aggregate() {
            Status::Success => Ok(()),
            status => Err(Error::from_status(status)),
        }
    }

    /// Status and payload of operation `index`.
    ///
    /// Fails with [`Error::InvalidParam`] when `index` is out of range, and
    /// with a would-block [`Error::Io`] when the response has not been
    /// received yet. For a non-success status the payload is
    /// [`Payload::None`]; otherwise its variant follows the operation kind.
    pub fn result(&self, index: usize) -> Result<(Status, &Payload), Error> {
        if index >= self.flight.len() {
            return Err(Error::InvalidParam("result index out of range"));
        }
        match self.flight.slot(index) {
            Some(slot) => Ok((slot.status, &slot.payload)),
            None => Err(Error::not_yet_received()),
        }
    }

    /// Number of operations in the batch.
    pub fn len(&self) -> usize {
        self.flight.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flight.len() == 0
    }

    /// Number of responses received so far.
    pub fn responses_received(&self) -> usize {
        self.flight.received()
    }

    /// Whether the receiver has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.flight.is_complete()
    }

    pub(crate) fn into_parts(self) -> (Arc<Flight>, JoinHandle<Transport>) {
        (self.flight, self.handle)
    }
}
