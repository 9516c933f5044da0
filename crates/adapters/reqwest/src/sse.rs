//! Server-Sent Events push connector.
//!
//! The response body is read on a spawned task that parses it into
//! [`RawFrame`]s and hands them over a bounded channel. Dropping the
//! returned stream closes the channel, which stops the task and releases
//! the HTTP connection.

use std::future::Future;
use std::pin::pin;

use homesync_app::ports::{FrameStream, PushConnector};
use homesync_domain::error::TransportError;
use homesync_domain::frame::RawFrame;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{ReqwestError, check_status};

/// Frames buffered between the reader task and the transport controller.
const FRAME_BUFFER: usize = 64;

type FrameSender = mpsc::Sender<Result<RawFrame, TransportError>>;

/// Incremental parser for the `text/event-stream` format.
///
/// Only `event:` and `data:` fields are kept; comments, `id:` and `retry:`
/// are ignored. A blank line dispatches the pending frame if it carries
/// data.
#[derive(Debug, Default)]
pub struct SseParser {
    pending: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    /// Feed a chunk of bytes and return every frame it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawFrame> {
        self.pending.extend_from_slice(chunk);
        let mut frames = Vec::new();
        while let Some(end) = self.pending.iter().position(|byte| *byte == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            if let Some(frame) = self.line(line.trim_end_matches(['\n', '\r'])) {
                frames.push(frame);
            }
        }
        frames
    }

    fn line(&mut self, line: &str) -> Option<RawFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<RawFrame> {
        let event = self.event.take().filter(|name| !name.is_empty());
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(RawFrame { event, data })
    }
}

/// [`PushConnector`] over an HTTP `GET` answered with `text/event-stream`.
#[derive(Debug, Clone, Default)]
pub struct SseConnector {
    http: reqwest::Client,
}

impl SseConnector {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

impl PushConnector for SseConnector {
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<FrameStream, TransportError>> + Send {
        let request = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        async move {
            let response = request.send().await.map_err(ReqwestError::from)?;
            let response = check_status(response)?;
            let (sender, receiver) = mpsc::channel(FRAME_BUFFER);
            tokio::spawn(pump(response, sender));
            Ok(Box::pin(ReceiverStream::new(receiver)) as FrameStream)
        }
    }
}

async fn pump(response: reqwest::Response, sender: FrameSender) {
    let mut chunks = pin!(response.bytes_stream());
    let mut parser = SseParser::default();
    loop {
        let chunk = tokio::select! {
            () = sender.closed() => return,
            chunk = chunks.next() => chunk,
        };
        match chunk {
            Some(Ok(bytes)) => {
                for frame in parser.feed(&bytes) {
                    if sender.send(Ok(frame)).await.is_err() {
                        return;
                    }
                }
            }
            Some(Err(err)) => {
                tracing::debug!(%err, "event stream body failed");
                let _ = sender.send(Err(TransportError::Stream(Box::new(err)))).await;
                return;
            }
            None => return,
        }
    }
}
