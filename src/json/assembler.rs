use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::{FusedStream, Stream};
use serde_json::Value;

use crate::error::LLMError;

use super::buffer::{ChunkBuffer, DEFAULT_MAX_BUFFER_SIZE};
use super::repair::parse_span;
use super::scanner::BoundaryScanner;
use super::template::Template;
use super::validator::{ObjectValidator, Predicate, Verdict};

/// Construction-time settings of a [`JsonStreamAssembler`].
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Shape every emitted object must match.
    pub template: Option<Template>,
    /// Ceiling for buffered unparsed text, in bytes.
    pub max_buffer_size: usize,
    /// Whether malformed spans get one repair attempt before being dropped.
    pub repair_json: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            template: None,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            repair_json: true,
        }
    }
}

impl AssemblerConfig {
    /// Parses and attaches a template given in its JSON description.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidTemplate`] when the description is malformed.
    pub fn with_template_value(mut self, template: &Value) -> Result<Self, LLMError> {
        self.template = Some(Template::from_value(template)?);
        Ok(self)
    }

    pub fn with_template(mut self, template: Template) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_max_buffer_size(mut self, max_buffer_size: usize) -> Self {
        self.max_buffer_size = max_buffer_size;
        self
    }

    pub fn with_repair_json(mut self, repair_json: bool) -> Self {
        self.repair_json = repair_json;
        self
    }
}

/// Turns a fragmented text stream into a stream of complete, validated JSON values.
///
/// The assembler itself is immutable; every call to [`process_stream`] owns a fresh
/// buffer and scan state, so one assembler can serve any number of streams.
///
/// [`process_stream`]: JsonStreamAssembler::process_stream
///
/// # Examples
///
/// ```
/// use futures_util::{StreamExt, stream};
/// use llmeasy::json::JsonStreamAssembler;
/// use serde_json::json;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let chunks = vec![
///     Ok::<_, std::convert::Infallible>(r#"{"key": "val"#),
///     Ok(r#"ue", "number": 42} {"next"#),
///     Ok(r#"": true}"#),
/// ];
/// let objects: Vec<_> = JsonStreamAssembler::default()
///     .process_stream(stream::iter(chunks))
///     .map(|item| item.unwrap())
///     .collect()
///     .await;
/// assert_eq!(objects, vec![json!({"key": "value", "number": 42}), json!({"next": true})]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonStreamAssembler {
    config: AssemblerConfig,
}

impl JsonStreamAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self { config }
    }

    /// Shorthand for an assembler that enforces `template` with default limits.
    ///
    /// # Errors
    ///
    /// Returns [`LLMError::InvalidTemplate`] when the description is malformed.
    pub fn with_template(template: &Value) -> Result<Self, LLMError> {
        Ok(Self::new(
            AssemblerConfig::default().with_template_value(template)?,
        ))
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    /// Consumes `upstream` lazily and yields accepted values in discovery order.
    ///
    /// An upstream error is forwarded unchanged and ends the stream; any partially
    /// received value is discarded. Malformed, rejected or overflowed text is dropped
    /// silently.
    pub fn process_stream<S, C, E>(&self, upstream: S) -> JsonObjectStream<S>
    where
        S: Stream<Item = Result<C, E>>,
        C: AsRef<str>,
    {
        JsonObjectStream::new(upstream, self.config.clone(), None)
    }

    /// Like [`process_stream`](Self::process_stream), additionally dropping values for
    /// which `validator` returns `false`.
    pub fn process_stream_with<S, C, E, F>(&self, upstream: S, validator: F) -> JsonObjectStream<S>
    where
        S: Stream<Item = Result<C, E>>,
        C: AsRef<str>,
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let predicate: Predicate = Box::new(move |value| Ok(validator(value)));
        JsonObjectStream::new(upstream, self.config.clone(), Some(predicate))
    }

    /// Like [`process_stream_with`](Self::process_stream_with) for validators that can
    /// fail. A value whose check returns `Err` is dropped and the error is logged at
    /// debug level; the stream itself keeps going.
    pub fn try_process_stream_with<S, C, E, F, VE>(
        &self,
        upstream: S,
        validator: F,
    ) -> JsonObjectStream<S>
    where
        S: Stream<Item = Result<C, E>>,
        C: AsRef<str>,
        F: Fn(&Value) -> Result<bool, VE> + Send + Sync + 'static,
        VE: fmt::Display,
    {
        let predicate: Predicate =
            Box::new(move |value| validator(value).map_err(|err| err.to_string()));
        JsonObjectStream::new(upstream, self.config.clone(), Some(predicate))
    }
}

/// Observable lifecycle of one assembly run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No text has arrived yet.
    Empty,
    /// Waiting for more text; a partial value may be buffered.
    Accumulating,
    /// Accepted values are queued for the consumer.
    Emitting,
    /// The last append crossed the buffer ceiling and everything buffered was discarded.
    Overflown,
    /// Upstream is exhausted.
    Done,
}

/// Synchronous heart of the assembler: feed chunks, collect accepted values.
pub(crate) struct Assembly {
    buffer: ChunkBuffer,
    scanner: BoundaryScanner,
    config: AssemblerConfig,
    predicate: Option<Predicate>,
    state: AssemblerState,
}

impl Assembly {
    pub(crate) fn new(config: AssemblerConfig, predicate: Option<Predicate>) -> Self {
        Self {
            buffer: ChunkBuffer::new(config.max_buffer_size),
            scanner: BoundaryScanner::new(),
            config,
            predicate,
            state: AssemblerState::Empty,
        }
    }

    /// Appends one chunk and pushes every value it completes onto `out`.
    pub(crate) fn push(&mut self, chunk: &str, out: &mut VecDeque<Value>) {
        if chunk.is_empty() {
            return;
        }
        if let Err(overflow) = self.buffer.append(chunk) {
            tracing::warn!(
                attempted = overflow.attempted,
                limit = overflow.limit,
                "JSON stream buffer overflow, discarding buffered text"
            );
            self.scanner.reset();
            self.state = AssemblerState::Overflown;
            return;
        }
        self.state = AssemblerState::Accumulating;

        let validator = ObjectValidator {
            template: self.config.template.as_ref(),
            predicate: self.predicate.as_ref(),
        };
        let text = self.buffer.as_str();
        while let Some(span) = self.scanner.next_span(text) {
            let Some(value) = parse_span(span.slice(text), self.config.repair_json).into_value()
            else {
                continue;
            };
            match validator.judge(&value) {
                Verdict::Accepted => out.push_back(value),
                verdict => tracing::debug!(%verdict, "dropping parsed JSON value"),
            }
        }

        let consumed = self.scanner.committed();
        self.buffer.consume(consumed);
        self.scanner.rebase(consumed);
    }

    /// Ends the run, discarding any unterminated trailing fragment.
    pub(crate) fn finish(&mut self) {
        if self.scanner.has_open_span() {
            tracing::debug!(
                buffered = self.buffer.len(),
                "discarding unterminated JSON fragment at end of stream"
            );
        }
        self.buffer.clear();
        self.scanner.reset();
        self.state = AssemblerState::Done;
    }

    pub(crate) fn state(&self) -> AssemblerState {
        self.state
    }
}

/// Lazy stream of accepted JSON values produced by [`JsonStreamAssembler`].
///
/// One upstream chunk is processed to completion before the next is requested, and
/// nothing is read ahead while accepted values are still waiting for the consumer.
/// Dropping the stream releases the buffer immediately.
pub struct JsonObjectStream<S> {
    upstream: Pin<Box<S>>,
    assembly: Assembly,
    pending: VecDeque<Value>,
    upstream_done: bool,
}

impl<S> JsonObjectStream<S> {
    fn new(upstream: S, config: AssemblerConfig, predicate: Option<Predicate>) -> Self {
        Self {
            upstream: Box::pin(upstream),
            assembly: Assembly::new(config, predicate),
            pending: VecDeque::new(),
            upstream_done: false,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AssemblerState {
        if !self.pending.is_empty() {
            AssemblerState::Emitting
        } else {
            self.assembly.state()
        }
    }
}

impl<S, C, E> FusedStream for JsonObjectStream<S>
where
    S: Stream<Item = Result<C, E>>,
    C: AsRef<str>,
{
    fn is_terminated(&self) -> bool {
        self.upstream_done && self.pending.is_empty()
    }
}

impl<S, C, E> Stream for JsonObjectStream<S>
where
    S: Stream<Item = Result<C, E>>,
    C: AsRef<str>,
{
    type Item = Result<Value, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(value) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(value)));
            }
            if this.upstream_done {
                return Poll::Ready(None);
            }

            match this.upstream.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => {
                    this.assembly.push(chunk.as_ref(), &mut this.pending);
                }
                Poll::Ready(Some(Err(err))) => {
                    // An upstream error is terminal. A half-received span is discarded.
                    this.assembly.finish();
                    this.upstream_done = true;
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    this.assembly.finish();
                    this.upstream_done = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
