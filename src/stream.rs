//! Server-Sent-Events decoding shared by every vendor adapter.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use futures_util::StreamExt;

use crate::error::LLMError;
use crate::http::HttpBodyStream;
use crate::provider::TextStream;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The event's `data:` lines joined with `\n`.
    Data(String),
    /// The OpenAI style `[DONE]` sentinel.
    Done,
}

/// Splits an HTTP body into [`StreamEvent`]s.
///
/// Only `data:` fields are kept. Lines may end in `\n` or `\r\n` and may be cut
/// anywhere by the transport; an event still open when the body ends is emitted.
pub struct StreamDecoder {
    body: HttpBodyStream,
    provider: &'static str,
    /// Bytes after the last complete line.
    partial: Vec<u8>,
    /// `data:` lines of the event being read.
    fields: Vec<Vec<u8>>,
    ready: VecDeque<Result<StreamEvent, LLMError>>,
    body_ended: bool,
    saw_done: bool,
}

impl StreamDecoder {
    pub fn new(body: HttpBodyStream, provider: &'static str) -> Self {
        Self {
            body,
            provider,
            partial: Vec::new(),
            fields: Vec::new(),
            ready: VecDeque::new(),
            body_ended: false,
            saw_done: false,
        }
    }

    fn feed(&mut self, bytes: &[u8]) {
        self.partial.extend_from_slice(bytes);
        let mut start = 0;
        while let Some(offset) = self.partial[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = self.partial[start..end]
                .strip_suffix(b"\r")
                .unwrap_or(&self.partial[start..end])
                .to_vec();
            start = end + 1;
            self.line(&line);
        }
        self.partial.drain(..start);
    }

    fn line(&mut self, line: &[u8]) {
        if line.is_empty() {
            self.dispatch();
        } else if let Some(value) = line.strip_prefix(b"data:") {
            let value = value.strip_prefix(b" ").unwrap_or(value);
            self.fields.push(value.to_vec());
        }
    }

    fn dispatch(&mut self) {
        if self.fields.is_empty() {
            return;
        }
        let payload = self.fields.join(&b'\n');
        self.fields.clear();
        if payload.is_empty() {
            return;
        }
        let event = match String::from_utf8(payload) {
            Ok(data) if data.trim() == "[DONE]" => {
                if self.saw_done {
                    return;
                }
                self.saw_done = true;
                Ok(StreamEvent::Done)
            }
            Ok(data) => Ok(StreamEvent::Data(data)),
            Err(err) => Err(LLMError::provider(
                self.provider,
                format!("invalid UTF-8 in stream chunk: {err}"),
            )),
        };
        self.ready.push_back(event);
    }

    fn close(&mut self) {
        self.body_ended = true;
        let tail = std::mem::take(&mut self.partial);
        if !tail.is_empty() {
            self.line(tail.strip_suffix(b"\r").unwrap_or(&tail));
        }
        self.dispatch();
    }
}

impl Stream for StreamDecoder {
    type Item = Result<StreamEvent, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(event) = this.ready.pop_front() {
                return Poll::Ready(Some(event));
            }
            if this.saw_done || this.body_ended {
                return Poll::Ready(None);
            }
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.feed(&bytes),
                Poll::Ready(Some(Err(err))) => return Poll::Ready(Some(Err(err))),
                Poll::Ready(None) => this.close(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// What a vendor-specific payload contributed to the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Delta {
    Text(String),
    /// Payload without text (role headers, usage, pings).
    Skip,
    /// Vendor-level end of message.
    Stop,
}

/// Turns an SSE body into a stream of answer text fragments.
///
/// `extract` maps each `data:` payload to a [`Delta`]; empty fragments are not yielded.
/// With `expect_end_marker`, a body that closes before `[DONE]` or [`Delta::Stop`]
/// ends the stream with [`LLMError::StreamClosed`].
pub(crate) fn text_stream<F>(
    body: HttpBodyStream,
    provider: &'static str,
    expect_end_marker: bool,
    extract: F,
) -> TextStream
where
    F: FnMut(&str) -> Result<Delta, LLMError> + Send + Unpin + 'static,
{
    Box::pin(TextDeltaStream {
        decoder: StreamDecoder::new(body, provider),
        extract,
        provider,
        expect_end_marker,
        finished: false,
    })
}

struct TextDeltaStream<F> {
    decoder: StreamDecoder,
    extract: F,
    provider: &'static str,
    expect_end_marker: bool,
    finished: bool,
}

impl<F> Stream for TextDeltaStream<F>
where
    F: FnMut(&str) -> Result<Delta, LLMError> + Unpin,
{
    type Item = Result<String, LLMError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        loop {
            let event = match Pin::new(&mut this.decoder).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => event,
                Poll::Ready(Some(Err(err))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    tracing::debug!(provider = this.provider, "event stream closed");
                    this.finished = true;
                    if this.expect_end_marker {
                        return Poll::Ready(Some(Err(LLMError::StreamClosed {
                            message: format!(
                                "{} stream ended before the end marker",
                                this.provider
                            ),
                        })));
                    }
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            };
            let data = match event {
                StreamEvent::Data(data) => data,
                StreamEvent::Done => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
            };
            match (this.extract)(&data) {
                Ok(Delta::Text(text)) if !text.is_empty() => return Poll::Ready(Some(Ok(text))),
                Ok(Delta::Text(_) | Delta::Skip) => continue,
                Ok(Delta::Stop) => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Err(err) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(err)));
                }
            }
        }
    }
}

/// Drains a streaming body into a string, used to read error payloads.
pub(crate) async fn collect_body_text(
    mut body: HttpBodyStream,
    provider: &'static str,
) -> Result<String, LLMError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    String::from_utf8(bytes).map_err(|err| {
        LLMError::provider(provider, format!("failed to decode stream error body: {err}"))
    })
}
