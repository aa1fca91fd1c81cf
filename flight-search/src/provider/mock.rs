//! Scripted in-process transport for testing without a provider.
//!
//! Each call to [`SearchTransport::open_stream`] or
//! [`SearchTransport::fetch_once`] takes the next scripted outcome from a
//! queue. Streams are fed through a [`StreamScript`] handle, so a test can
//! decide exactly when each chunk arrives.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio::sync::mpsc;

use crate::domain::SearchRequest;

use super::SearchTransport;
use super::decoder::ByteStream;
use super::error::TransportError;
use super::types::{SearchResponse, StreamEvent};

#[derive(Default)]
struct Script {
    streams: VecDeque<Result<ByteStream, TransportError>>,
    responses: VecDeque<Result<SearchResponse, TransportError>>,
    requests: Vec<SearchRequest>,
    stream_calls: usize,
    fetch_calls: usize,
}

/// A transport whose every answer is set up in advance.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_script<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut script)
    }

    /// Queue a stream and return the handle that feeds it.
    pub fn push_stream(&self) -> StreamScript {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })
        .boxed();
        self.with_script(|s| s.streams.push_back(Ok(stream)));
        StreamScript { tx: Some(tx) }
    }

    /// Queue a stream that delivers `events` and then closes.
    pub fn push_events(&self, events: &[StreamEvent]) {
        let mut script = self.push_stream();
        for event in events {
            script.send(event);
        }
        script.close();
    }

    /// Queue a rejected stream (non-success status before any event).
    pub fn push_stream_error(&self, error: TransportError) {
        self.with_script(|s| s.streams.push_back(Err(error)));
    }

    /// Queue a non-streaming response.
    pub fn push_response(&self, response: Result<SearchResponse, TransportError>) {
        self.with_script(|s| s.responses.push_back(response));
    }

    /// Number of streams opened.
    pub fn stream_calls(&self) -> usize {
        self.with_script(|s| s.stream_calls)
    }

    /// Number of non-streaming searches issued.
    pub fn fetch_calls(&self) -> usize {
        self.with_script(|s| s.fetch_calls)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<SearchRequest> {
        self.with_script(|s| s.requests.clone())
    }
}

impl SearchTransport for ScriptedTransport {
    async fn open_stream(&self, request: &SearchRequest) -> Result<ByteStream, TransportError> {
        self.with_script(|s| {
            s.stream_calls += 1;
            s.requests.push(request.clone());
            s.streams
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Unavailable("no stream scripted".into())))
        })
    }

    async fn fetch_once(&self, request: &SearchRequest) -> Result<SearchResponse, TransportError> {
        self.with_script(|s| {
            s.fetch_calls += 1;
            s.requests.push(request.clone());
            s.responses
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Unavailable("no response scripted".into())))
        })
    }
}

/// Feeds one scripted stream.
pub struct StreamScript {
    tx: Option<mpsc::UnboundedSender<Result<Vec<u8>, TransportError>>>,
}

impl StreamScript {
    /// Send raw bytes; they need not align with event boundaries.
    pub fn send_raw(&mut self, bytes: impl Into<Vec<u8>>) {
        if let Some(tx) = &self.tx {
            // The consumer may already have dropped the stream
            let _ = tx.send(Ok(bytes.into()));
        }
    }

    /// Send one complete event frame.
    pub fn send(&mut self, event: &StreamEvent) {
        if let Ok(frame) = event.to_sse_frame() {
            self.send_raw(frame);
        }
    }

    /// Fail the stream with a transport error.
    pub fn fail(&mut self, error: TransportError) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// End the stream.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Whether the consumer has dropped the stream.
    pub fn is_cancelled(&self) -> bool {
        self.tx.as_ref().is_none_or(|tx| tx.is_closed())
    }
}
