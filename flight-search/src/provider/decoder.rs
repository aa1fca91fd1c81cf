//! Decoding of `data: <json>` event streams.
//!
//! Transport chunks do not respect event boundaries. Framing is left to
//! `eventsource-stream`, which buffers partial lines and split multi-byte
//! characters; this module turns each complete frame into a [`StreamEvent`].

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures::StreamExt;
use futures::future::ready;
use futures::stream::BoxStream;
use tracing::{trace, warn};

use super::error::TransportError;
use super::types::StreamEvent;

/// Raw response body chunks.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Parsed events, in arrival order.
pub type EventStream = BoxStream<'static, Result<StreamEvent, TransportError>>;

/// Interpret one SSE frame. `None` means the frame carries nothing to act on.
fn parse_frame(frame: &Event) -> Option<StreamEvent> {
    if frame.data.is_empty() {
        trace!(event = %frame.event, "ignoring frame without data");
        return None;
    }
    match StreamEvent::parse(&frame.data) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "skipping malformed event");
            None
        }
    }
}

fn into_transport(err: EventStreamError<TransportError>) -> TransportError {
    match err {
        EventStreamError::Transport(e) => e,
        other => TransportError::Json {
            message: other.to_string(),
            body: None,
        },
    }
}

/// Turn a byte stream into a lazy, finite stream of events.
///
/// Malformed events are logged and skipped. A transport error is yielded
/// once and ends the stream.
pub fn decode_events(bytes: ByteStream) -> EventStream {
    bytes
        .eventsource()
        .scan(false, |failed, item| {
            if *failed {
                return ready(None);
            }
            let next = match item {
                Ok(frame) => parse_frame(&frame).map(Ok),
                Err(e) => {
                    *failed = true;
                    Some(Err(into_transport(e)))
                }
            };
            ready(Some(next))
        })
        .filter_map(ready)
        .boxed()
}
