//! Search provider boundary.
//!
//! A provider accepts a [`SearchRequest`] and answers either with a stream of
//! `data: <json>` events (one per route, then `complete`) or with a single
//! JSON document. [`SearchTransport`] abstracts over the real HTTP client,
//! the in-process generator and scripted test transports.

mod client;
mod decoder;
mod error;
mod generator;
mod mock;
mod types;

use std::future::Future;

use crate::domain::SearchRequest;

pub use client::{SearchClient, SearchClientConfig};
pub use decoder::{ByteStream, EventStream, decode_events};
pub use error::{MalformedEvent, TransportError};
pub use generator::{DATA_SOURCE, FlightGenerator, GeneratorConfig};
pub use mock::{ScriptedTransport, StreamScript};
pub use types::{SearchResponse, StreamEvent, WireSearchResponse, normalize_flights};

/// Something that can run searches.
///
/// Dropping a stream returned by [`open_stream`](Self::open_stream) cancels
/// the underlying request.
pub trait SearchTransport: Send + Sync {
    /// Start a streaming search. Fails before any event if the provider
    /// rejects the request.
    fn open_stream(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<ByteStream, TransportError>> + Send;

    /// Run a search as one request/response round trip.
    fn fetch_once(
        &self,
        request: &SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, TransportError>> + Send;
}
