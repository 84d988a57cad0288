//! kvpipe: a pipelined client for a remote key-value store.
//!
//! The server speaks a compact binary request/response protocol over a
//! reliable stream, optionally wrapped in TLS 1.3 with mutual
//! authentication. kvpipe gives that protocol two faces:
//!
//! - **Single operations**: [`Client::get`], [`Client::insert`],
//!   [`Client::delete`], [`Client::range_query`], and
//!   [`Client::atomic_inc_dec`] each run as a batch of one and return the
//!   decoded result directly.
//! - **Pipelined batches**: up to 128 operations assembled in a [`Batch`],
//!   transmitted as a single vectored write, with responses demultiplexed
//!   in request order by a background receiver and read back through a
//!   [`Tracker`].
//!
//! # Overview
//!
//! ```text
//!  caller                                              kvpipe
//! ┌──────────────┐  add_*   ┌───────┐  submit  ┌─────────────────────┐
//! │ keys, values │ ───────► │ Batch │ ───────► │ one vectored send   │
//! └──────────────┘          └───────┘          │ [hdr|op|key|val|…]  │
//!                                              └──────────┬──────────┘
//!                                                         ▼ network
//!                                              ┌─────────────────────┐
//! ┌──────────────┐  result(i)  ┌─────────┐     │ background receiver │
//! │ caller reads │ ◄────────── │ Tracker │ ◄── │ response i ↔ op i   │
//! └──────────────┘    wait()   └─────────┘     └─────────────────────┘
//! ```
//!
//! The server does not tag responses: the i-th response answers the i-th
//! request. The submitted batch therefore acts as the decoding schema, and
//! a batch is immutable from submission until its tracker is retired.
//!
//! # Quick start
//!
//! ```no_run
//! use std::time::Duration;
//! use kvpipe::{Client, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), kvpipe::Error> {
//!     let config = Config::new("127.0.0.1", 7000).timeout(Duration::from_secs(5));
//!     let mut client = Client::connect(&config).await?;
//!
//!     client.insert(b"temperature", b"21.5", 1000).await?;
//!     let value = client.get(b"temperature").await?;
//!     println!("temperature = {}", String::from_utf8_lossy(&value));
//!
//!     let counter = client.atomic_inc_dec(b"visits", 1, 1001).await?;
//!     println!("visits = {counter}");
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! # Batching and pipelining
//!
//! A batch is one framed transmission and one response segment; batching
//! amortizes syscalls and lets the server process operations back to back
//! without per-op acknowledgment boundaries. Results arrive incrementally:
//! [`Tracker::result`] serves any slot the receiver has already published,
//! while [`Tracker::wait`] observes overall completion.
//!
//! ```no_run
//! # use std::time::Duration;
//! # use kvpipe::{Client, Config};
//! # async fn example(client: &mut Client) -> Result<(), kvpipe::Error> {
//! let mut batch = client.batch();
//! batch.add_insert(b"a", b"1", 1)?;
//! batch.add_insert(b"b", b"2", 2)?;
//! batch.add_get(b"a")?;
//! batch.add_delete(b"b", 3)?;
//!
//! let tracker = client.submit(batch).await?;
//! tracker.wait(Duration::ZERO).await?;
//! for index in 0..tracker.len() {
//!     let (status, payload) = tracker.result(index)?;
//!     println!("op {index}: {status} {payload:?}");
//! }
//! client.retire(tracker).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Errors and statuses
//!
//! Fallible calls return [`Error`]; each variant maps onto one of the
//! stable numeric [`Status`] codes shared with the server. Batch consumers
//! inspect per-slot statuses: a successful [`Tracker::wait`] means the
//! pipeline ran clean, not that every operation succeeded. Semantic
//! statuses such as [`Status::KeyNotFound`] never poison the session;
//! transport and protocol failures do, and the session then refuses
//! further work until reconnected.
//!
//! # TLS
//!
//! [`TlsConfig`] wraps the stream in TLS 1.3: CA roots, optional mutual
//! authentication, hostname-override verification, or verification
//! disabled entirely for isolated networks. Vectored sends are funneled
//! through record-sized chunks internally; the byte stream the server sees
//! is identical to the plain-TCP one.

mod api;
mod codec;
mod config;
mod error;
mod pipeline;
mod protocol;
mod sync;
mod transport;

pub use api::Client;
pub use config::{Config, TlsConfig};
pub use error::{Error, Status};
pub use pipeline::{
    batch::Batch,
    flight::{Payload, RangeEntry},
    tracker::Tracker,
};
pub use protocol::{MAX_BATCH_OPS, MAX_KEY_SIZE, MAX_VALUE_SIZE, RANGE_VALUE_LEN_WIDTH};
