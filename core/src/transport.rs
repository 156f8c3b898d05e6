//! Executes `HttpRequest` values against the network.
//!
//! # Design
//! `Transport` is the seam between the pure build/parse halves of the client
//! and real I/O. The default implementation uses a blocking `ureq` agent with
//! status-as-error disabled, so 4xx/5xx come back as data and the client
//! decides what they mean. Tests swap in stub transports.
//!
//! `ureq` cannot be interrupted from outside a blocked read, so each round
//! trip runs on its own short-lived worker thread that streams events over a
//! bounded channel. The calling thread waits on that channel in short slices
//! and re-checks the `Context` between them, which lets it walk away as soon
//! as the context is cancelled or its deadline passes. A worker that has been
//! walked away from exits at its next send or when the request timeout fires.

use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::context::{Context, ContextError};
use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};

/// Longest the caller sleeps on the channel before re-checking its context.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

const CHUNK_SIZE: usize = 8 * 1024;

/// Chunks buffered ahead of the reader.
const CHANNEL_DEPTH: usize = 4;

/// Performs one HTTP round trip.
///
/// Implementations must honour the context: a context that is already done,
/// or becomes done before the response arrives, yields `Canceled` / `Timeout`
/// without waiting for the server.
pub trait Transport: Send + Sync {
    fn execute(&self, ctx: &Context, req: &HttpRequest) -> Result<HttpResponse, ApiError>;
}

impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    fn execute(&self, ctx: &Context, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        (**self).execute(ctx, req)
    }
}

/// Blocking transport backed by `ureq`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent. It must have `http_status_as_error`
    /// disabled, otherwise non-200 responses surface as transport errors.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, ctx: &Context, req: &HttpRequest) -> Result<HttpResponse, ApiError> {
        if let Some(err) = ctx.err() {
            return Err(err.into());
        }

        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        let agent = self.agent.clone();
        let request = req.clone();
        let timeout = ctx.remaining();
        thread::Builder::new()
            .name("sesame-http".to_string())
            .spawn(move || round_trip(&agent, &request, timeout, &tx))
            .map_err(ApiError::transport)?;

        match next_event(ctx, &rx) {
            Wait::Event(Event::Head { status, headers }) => {
                debug!(status, "received response headers");
                Ok(HttpResponse {
                    status,
                    headers,
                    body: ResponseBody::new(StreamedBody::new(ctx.clone(), rx)),
                })
            }
            Wait::Event(Event::Failed(err)) => Err(map_ureq_error(ctx, err)),
            Wait::Event(_) | Wait::Gone => Err(ApiError::transport(io::Error::other(
                "request worker exited before response headers",
            ))),
            Wait::Done(err) => {
                debug!(%err, "abandoning in-flight request");
                Err(err.into())
            }
        }
    }
}

/// What the worker thread reports back, in order: `Head` or `Failed` first,
/// then `Chunk`s closed off by `End` or `BodyFailed`.
enum Event {
    Head {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Failed(ureq::Error),
    Chunk(Vec<u8>),
    End,
    BodyFailed(io::Error),
}

enum Wait {
    Event(Event),
    Done(ContextError),
    Gone,
}

/// Block until the worker reports or the context is done.
fn next_event(ctx: &Context, rx: &Receiver<Event>) -> Wait {
    loop {
        if let Some(err) = ctx.err() {
            return Wait::Done(err);
        }
        let slice = ctx
            .remaining()
            .map_or(POLL_INTERVAL, |left| left.min(POLL_INTERVAL));
        match rx.recv_timeout(slice) {
            Ok(event) => return Wait::Event(event),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return Wait::Gone,
        }
    }
}

/// Worker side of one request. Stops as soon as the receiver is gone.
fn round_trip(
    agent: &ureq::Agent,
    req: &HttpRequest,
    timeout: Option<Duration>,
    tx: &SyncSender<Event>,
) {
    let mut builder = match req.method {
        HttpMethod::Get => agent.get(&req.url),
    };
    for (name, value) in &req.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(timeout) = timeout {
        builder = builder.config().timeout_global(Some(timeout)).build();
    }

    let response = match builder.call() {
        Ok(response) => response,
        Err(err) => {
            let _ = tx.send(Event::Failed(err));
            return;
        }
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
    if tx.send(Event::Head { status, headers }).is_err() {
        return;
    }

    let (_, body) = response.into_parts();
    let mut reader = body.into_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let event = match reader.read(&mut buf) {
            Ok(0) => Event::End,
            Ok(n) => Event::Chunk(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => Event::BodyFailed(e),
        };
        let last = !matches!(event, Event::Chunk(_));
        if tx.send(event).is_err() || last {
            return;
        }
    }
}

fn map_ureq_error(ctx: &Context, err: ureq::Error) -> ApiError {
    if let Some(ctx_err) = ctx.err() {
        return ctx_err.into();
    }
    match err {
        ureq::Error::Timeout(_) => ApiError::Timeout,
        ureq::Error::Io(e) if e.kind() == io::ErrorKind::TimedOut => ApiError::Timeout,
        other => ApiError::transport(other),
    }
}

/// Response body fed by the worker thread.
///
/// Dropping it drops the receiver, which stops the worker at its next send.
struct StreamedBody {
    ctx: Context,
    rx: Receiver<Event>,
    chunk: Vec<u8>,
    pos: usize,
    finished: bool,
}

impl StreamedBody {
    fn new(ctx: Context, rx: Receiver<Event>) -> Self {
        Self {
            ctx,
            rx,
            chunk: Vec::new(),
            pos: 0,
            finished: false,
        }
    }
}

impl Read for StreamedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.chunk.len() {
                let n = buf.len().min(self.chunk.len() - self.pos);
                buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.finished {
                return Ok(0);
            }
            match next_event(&self.ctx, &self.rx) {
                Wait::Event(Event::Chunk(bytes)) => {
                    self.chunk = bytes;
                    self.pos = 0;
                }
                Wait::Event(Event::End) => self.finished = true,
                Wait::Event(Event::BodyFailed(err)) => {
                    self.finished = true;
                    return Err(err);
                }
                Wait::Event(Event::Head { .. } | Event::Failed(_)) | Wait::Gone => {
                    self.finished = true;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "response stream ended early",
                    ));
                }
                Wait::Done(err) => return Err(io::Error::other(err)),
            }
        }
    }
}

/// Reader that refuses to continue once its context is done.
///
/// For `Transport` implementations whose body reads return promptly. The
/// abort surfaces as an `io::Error` carrying the `ContextError`, which
/// `ApiError::from_body_io` maps back to `Canceled` / `Timeout`.
pub struct ContextReader<R> {
    ctx: Context,
    inner: R,
}

impl<R> ContextReader<R> {
    pub fn new(ctx: Context, inner: R) -> Self {
        Self { ctx, inner }
    }
}

impl<R: Read> Read for ContextReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.ctx.err() {
            return Err(io::Error::other(err));
        }
        self.inner.read(buf)
    }
}
