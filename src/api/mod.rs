//! High-level client API.
//!
//! [`Client`] owns one transport session and drives both faces of the
//! library: single-operation calls (`get`, `insert`, …) that run as batches
//! of one and decode inline, and explicit batches submitted with
//! [`Client::submit`] whose responses are consumed by a background receiver
//! task and read back through a [`Tracker`].

use std::{mem, sync::Arc, time::Duration};

use tokio::{io::AsyncWriteExt, net::TcpStream, time};
use tracing::debug;

use crate::{
    config::Config,
    error::{Error, Status},
    pipeline::{
        batch::Batch,
        flight::{Flight, OpResult, Payload, RangeEntry},
        rx,
        tracker::Tracker,
        tx,
    },
    transport::{tls, Transport},
};

enum State {
    /// Session idle; the transport is available for the next operation.
    Ready(Transport),
    /// A submitted batch owns the transport until its tracker is retired.
    InFlight,
    /// A transport or protocol failure poisoned the session.
    Invalid,
}

/// A client session against one server endpoint.
///
/// A session is exclusively owned: one submitter drives it, and between a
/// [`submit`](Self::submit) and the matching [`retire`](Self::retire) the
/// transport belongs to that batch's receiver. The protocol does not permit
/// interleaving batches on one connection, so a second submit (or any
/// single operation) in that window fails with [`Error::Busy`].
///
/// After any unrecoverable transport or protocol failure the session is
/// invalid: every subsequent operation fails with an i/o error without
/// touching the socket. Reconnection is the caller's decision.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use kvpipe::{Client, Config};
///
/// # async fn example() -> Result<(), kvpipe::Error> {
/// let config = Config::new("127.0.0.1", 7000).timeout(Duration::from_secs(5));
/// let mut client = Client::connect(&config).await?;
///
/// client.insert(b"greeting", b"hello", 1000).await?;
/// let value = client.get(b"greeting").await?;
/// assert_eq!(value, b"hello");
///
/// // Pipelined batch: one transmission, responses demultiplexed in order.
/// let mut batch = client.batch();
/// batch.add_insert(b"a", b"1", 1001)?;
/// batch.add_get(b"a")?;
/// let tracker = client.submit(batch).await?;
/// tracker.wait(Duration::ZERO).await?;
/// let (status, payload) = tracker.result(1)?;
/// println!("slot 1: {status} {payload:?}");
/// client.retire(tracker).await?;
/// # Ok(())
/// # }
/// ```
pub struct Client {
    state: State,
    timeout: Duration,
}

impl Client {
    /// Establishes a session per `config`, including the TLS handshake when
    /// TLS is configured. The configured timeout bounds establishment.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        if config.port == 0 {
            return Err(Error::InvalidParam("port must be non-zero"));
        }

        let timeout = config.timeout;
        let transport = if timeout.is_zero() {
            open(config).await?
        } else {
            match time::timeout(timeout, open(config)).await {
                Ok(transport) => transport?,
                Err(_) => return Err(Error::timed_out()),
            }
        };

        debug!(
            host = %config.host,
            port = config.port,
            tls = config.tls.is_some(),
            "session established"
        );
        Ok(Self {
            state: State::Ready(transport),
            timeout,
        })
    }

    /// Shuts the session down cleanly. Dropping the client closes the
    /// socket without the shutdown handshake.
    pub async fn disconnect(mut self) {
        if let State::Ready(mut transport) = mem::replace(&mut self.state, State::Invalid) {
            let _ = transport.shutdown().await;
        }
    }

    /// An empty batch ready for assembly against this session.
    pub fn batch(&self) -> Batch {
        Batch::new()
    }

    /// Fetches the value stored under `key`.
    ///
    /// A missing key surfaces as [`Error::KeyNotFound`]. An empty stored
    /// value yields an empty vector.
    pub async fn get(&mut self, key: &[u8]) -> Result<Vec<u8>, Error> {
        let mut batch = Batch::new();
        batch.add_get(key)?;
        let result = self.round_trip(batch).await?;
        match (result.status, result.payload) {
            (Status::Success, Payload::Bytes(value)) => Ok(value),
            (Status::Success, _) => Err(Error::Protocol("unexpected payload variant")),
            (status, _) => Err(Error::from_status(status)),
        }
    }

    /// Stores `value` under `key` at `timestamp`.
    ///
    /// Timestamps are caller-supplied monotonic values; the client never
    /// rewrites them.
    pub async fn insert(&mut self, key: &[u8], value: &[u8], timestamp: u64) -> Result<(), Error> {
        let mut batch = Batch::new();
        batch.add_insert(key, value, timestamp)?;
        let result = self.round_trip(batch).await?;
        match result.status {
            Status::Success => Ok(()),
            status => Err(Error::from_status(status)),
        }
    }

    /// Removes the entry under `key` at `timestamp`.
    pub async fn delete(&mut self, key: &[u8], timestamp: u64) -> Result<(), Error> {
        let mut batch = Batch::new();
        batch.add_delete(key, timestamp)?;
        let result = self.round_trip(batch).await?;
        match result.status {
            Status::Success => Ok(()),
            status => Err(Error::from_status(status)),
        }
    }

    /// Fetches all entries with keys in the inclusive interval
    /// `start_key..=end_key`, in key order. An empty interval yields an
    /// empty list.
    pub async fn range_query(
        &mut self,
        start_key: &[u8],
        end_key: &[u8],
    ) -> Result<Vec<RangeEntry>, Error> {
        let mut batch = Batch::new();
        batch.add_range_query(start_key, end_key)?;
        let result = self.round_trip(batch).await?;
        match (result.status, result.payload) {
            (Status::Success, Payload::Range(entries)) => Ok(entries),
            (Status::Success, _) => Err(Error::Protocol("unexpected payload variant")),
            (status, _) => Err(Error::from_status(status)),
        }
    }

    /// Applies `delta` to the signed counter under `key` at `timestamp` and
    /// returns the post-operation value.
    pub async fn atomic_inc_dec(
        &mut self,
        key: &[u8],
        delta: i64,
        timestamp: u64,
    ) -> Result<i64, Error> {
        let mut batch = Batch::new();
        batch.add_atomic_inc_dec(key, delta, timestamp)?;
        let result = self.round_trip(batch).await?;
        match (result.status, result.payload) {
            (Status::Success, Payload::Counter(value)) => Ok(value),
            (Status::Success, _) => Err(Error::Protocol("unexpected payload variant")),
            (status, _) => Err(Error::from_status(status)),
        }
    }

    /// Submits `batch` as one pipelined transmission and spawns its
    /// background receiver.
    ///
    /// On a send failure the submission fails atomically: no tracker is
    /// produced, the batch is dropped, and the session becomes invalid.
    pub async fn submit(&mut self, batch: Batch) -> Result<Tracker, Error> {
        if batch.is_empty() {
            return Err(Error::InvalidParam("batch contains no operations"));
        }

        let mut transport = match mem::replace(&mut self.state, State::InFlight) {
            State::Ready(transport) => transport,
            State::InFlight => return Err(Error::Busy),
            State::Invalid => {
                self.state = State::Invalid;
                return Err(Error::invalid_session());
            }
        };

        if let Err(err) = tx::send_batch(&mut transport, &batch).await {
            self.state = State::Invalid;
            return Err(err);
        }
        debug!(ops = batch.len(), "batch submitted");

        let flight = Arc::new(Flight::new(batch));
        let handle = tokio::spawn(rx::receive(transport, Arc::clone(&flight)));
        Ok(Tracker::new(flight, handle))
    }

    /// Retires `tracker`: joins its receiver, releases every buffer it
    /// owns, and returns the transport to this session.
    ///
    /// Joining first makes premature retirement impossible; a retire issued
    /// before completion simply waits for the receiver to finish. If the
    /// receiver recorded a fatal error the session stays invalid.
    pub async fn retire(&mut self, tracker: Tracker) -> Result<(), Error> {
        let (flight, handle) = tracker.into_parts();
        let transport = match handle.await {
            Ok(transport) => transport,
            Err(_) => {
                self.state = State::Invalid;
                return Err(Error::Io(std::io::Error::other("receiver task failed")));
            }
        };

        let aggregate = flight.aggregate();
        drop(flight);

        if matches!(self.state, State::InFlight) {
            self.state = if aggregate.is_success() {
                State::Ready(transport)
            } else {
                State::Invalid
            };
        }
        debug!(status = aggregate.code(), "batch retired");
        Ok(())
    }

    /// Runs a one-element batch and decodes its single response inline on
    /// the caller's task. Wire-identical to an async submission of the same
    /// batch.
    async fn round_trip(&mut self, batch: Batch) -> Result<OpResult, Error> {
        let kind = batch.ops()[0].kind;
        let deadline = self.timeout;

        let transport = match &mut self.state {
            State::Ready(transport) => transport,
            State::InFlight => return Err(Error::Busy),
            State::Invalid => return Err(Error::invalid_session()),
        };

        let io = async {
            tx::send_batch(transport, &batch).await?;
            rx::read_op_response(transport, kind).await
        };
        let result = if deadline.is_zero() {
            io.await
        } else {
            match time::timeout(deadline, io).await {
                Ok(result) => result,
                Err(_) => Err(Error::timed_out()),
            }
        };

        match result {
            Ok(result) => Ok(result),
            Err(err) => {
                self.state = State::Invalid;
                Err(err)
            }
        }
    }
}

async fn open(config: &Config) -> Result<Transport, Error> {
    let stream = TcpStream::connect((config.host.as_str(), config.port)).await?;
    let _ = stream.set_nodelay(true);

    match &config.tls {
        None => Ok(Transport::Plain(stream)),
        Some(tls_config) => {
            let connector = tls::connector(tls_config)?;
            let name = tls::server_name(tls_config, &config.host)?;
            let stream = connector.connect(name, stream).await?;
            Ok(Transport::Tls(Box::new(stream)))
        }
    }
}
