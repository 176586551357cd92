//! Socket transport.
//!
//! One connection carries any number of concurrent calls. Two tasks own the
//! halves of the connection; callers talk to them through a shared call
//! table keyed by call id.
//!
//! ```text
//!   caller ── register(id) ──▶ CallTable ◀── dispatch ── read_loop ◀── socket
//!      │                          │
//!      └── ClientFrame ── mpsc ──▶ write_loop ──────────────────────▶ socket
//! ```
//!
//! Unary replies travel back over a oneshot. Each search owns a queue that
//! the reader appends to without waiting; the server may run at most
//! `chunk_buffer` chunks ahead of the consumer, and every chunk the
//! consumer takes is returned to the server as a `Credit`. A search that
//! nobody reads therefore holds back only its own chunks, never the
//! connection. Dropping a pending call sends `Cancel` to the server.

use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Waker};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::transport::{
    ChunkStream, ExistsRequest, FileDeviceTransport, ScanRequest, SearchRequest, TransportError,
};
use crate::wire::{ClientFrame, ServerFrame, decode_frame, encode_frame, frame_codec};

// ============================================================================
// Call table
// ============================================================================

/// Where the reply to a pending call goes.
enum Call {
    Scan(oneshot::Sender<Result<(), TransportError>>),
    Exists(oneshot::Sender<Result<bool, TransportError>>),
    Search(Arc<Mutex<SearchState>>),
}

/// How a search ended, as seen by the reader.
enum SearchEnd {
    Done,
    Failed(TransportError),
}

/// Chunks received for one search and not yet taken by its consumer.
#[derive(Default)]
struct SearchState {
    chunks: VecDeque<Bytes>,
    /// Set once no more chunks will arrive. Yielded after `chunks` drains.
    end: Option<SearchEnd>,
    waker: Option<Waker>,
}

impl SearchState {
    fn push(&mut self, chunk: Bytes) {
        self.chunks.push_back(chunk);
        self.wake();
    }

    fn finish(&mut self, end: SearchEnd) {
        if self.end.is_none() {
            self.end = Some(end);
        }
        self.wake();
    }

    fn wake(&mut self) {
        if let Some(waker) = self.waker.take() {
            waker.wake();
        }
    }
}

#[derive(Default)]
struct CallTable {
    calls: HashMap<u64, Call>,
    /// Set once the connection is gone; no new calls are accepted.
    closed: Option<String>,
}

struct Shared {
    outbound: mpsc::UnboundedSender<Bytes>,
    calls: Mutex<CallTable>,
    next_id: AtomicU64,
    /// Chunks the server may send ahead of a search consumer.
    window: usize,
    shutdown: CancellationToken,
}

impl Shared {
    fn register(&self, call: Call) -> Result<u64, TransportError> {
        let mut table = self.calls.lock();
        if let Some(reason) = &table.closed {
            return Err(TransportError::ConnectionLost(reason.clone()));
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        table.calls.insert(id, call);
        Ok(id)
    }

    fn remove(&self, id: u64) -> Option<Call> {
        self.calls.lock().calls.remove(&id)
    }

    fn send(&self, frame: &ClientFrame) -> Result<(), TransportError> {
        let body = encode_frame(frame)?;
        self.outbound.send(body).map_err(|_| TransportError::Closed)
    }

    /// Drop a call the client no longer wants and tell the server.
    fn abandon(&self, id: u64) {
        if self.remove(id).is_some() {
            log::debug!("cancelling call {id}");
            // The writer may already be gone; the server sees the disconnect instead.
            let _ = self.send(&ClientFrame::Cancel { id });
        }
    }

    /// Let the server send `chunks` more chunks for search `id`.
    fn grant(&self, id: u64, chunks: u32) {
        if self.calls.lock().calls.contains_key(&id) {
            let _ = self.send(&ClientFrame::Credit { id, chunks });
        }
    }

    /// Route one server frame. Never waits on a consumer.
    fn dispatch(&self, frame: ServerFrame) {
        let id = frame.id();
        match frame {
            ServerFrame::Chunk { data, .. } => {
                let state = match self.calls.lock().calls.get(&id) {
                    Some(Call::Search(state)) => state.clone(),
                    Some(_) => {
                        log::warn!("chunk for non-search call {id}");
                        return;
                    }
                    None => {
                        log::trace!("dropping chunk for finished call {id}");
                        return;
                    }
                };
                let mut state = state.lock();
                state.push(data);
                if state.chunks.len() > self.window {
                    log::warn!("server overran the window of search {id} ({} queued)", state.chunks.len());
                }
            }
            ServerFrame::SearchDone { .. } => match self.remove(id) {
                Some(Call::Search(state)) => {
                    log::debug!("search {id} complete");
                    state.lock().finish(SearchEnd::Done);
                }
                Some(other) => self.mismatch(id, other, "SearchDone"),
                None => log::trace!("SearchDone for unknown call {id}"),
            },
            ServerFrame::ScanDone { .. } => match self.remove(id) {
                Some(Call::Scan(reply)) => {
                    let _ = reply.send(Ok(()));
                }
                Some(other) => self.mismatch(id, other, "ScanDone"),
                None => log::trace!("ScanDone for unknown call {id}"),
            },
            ServerFrame::Exists { value, .. } => match self.remove(id) {
                Some(Call::Exists(reply)) => {
                    let _ = reply.send(Ok(value));
                }
                Some(other) => self.mismatch(id, other, "Exists"),
                None => log::trace!("Exists for unknown call {id}"),
            },
            ServerFrame::Failed { message, .. } => match self.remove(id) {
                Some(call) => {
                    log::debug!("call {id} failed: {message}");
                    fail(call, TransportError::Server(message));
                }
                None => log::trace!("Failed for unknown call {id}"),
            },
        }
    }

    fn mismatch(&self, id: u64, call: Call, got: &str) {
        log::warn!("server answered call {id} with {got}");
        fail(call, TransportError::Server(format!("unexpected {got} reply")));
    }

    /// Fail every pending call and refuse new ones.
    fn fail_all(&self, reason: String) {
        let pending: Vec<Call> = {
            let mut table = self.calls.lock();
            table.closed = Some(reason.clone());
            table.calls.drain().map(|(_, call)| call).collect()
        };
        if !pending.is_empty() {
            log::warn!("connection lost with {} calls pending: {reason}", pending.len());
        }
        for call in pending {
            fail(call, TransportError::ConnectionLost(reason.clone()));
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn fail(call: Call, error: TransportError) {
    match call {
        Call::Scan(reply) => {
            let _ = reply.send(Err(error));
        }
        Call::Exists(reply) => {
            let _ = reply.send(Err(error));
        }
        // Yielded after the chunks already queued.
        Call::Search(state) => state.lock().finish(SearchEnd::Failed(error)),
    }
}

/// Abandons its call when dropped before the reply arrived.
struct CallGuard {
    id: u64,
    shared: Arc<Shared>,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.shared.abandon(self.id);
    }
}

/// Chunks of one search call.
struct ChunkReceiver {
    state: Arc<Mutex<SearchState>>,
    guard: CallGuard,
}

impl Stream for ChunkReceiver {
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut state = this.state.lock();
        if let Some(chunk) = state.chunks.pop_front() {
            let live = state.end.is_none();
            drop(state);
            if live {
                this.guard.shared.grant(this.guard.id, 1);
            }
            return Poll::Ready(Some(Ok(chunk)));
        }
        match state.end.take() {
            Some(SearchEnd::Failed(error)) => {
                state.end = Some(SearchEnd::Done);
                Poll::Ready(Some(Err(error)))
            }
            Some(SearchEnd::Done) => {
                state.end = Some(SearchEnd::Done);
                Poll::Ready(None)
            }
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

// ============================================================================
// Connection tasks
// ============================================================================

async fn write_loop<W>(
    mut sink: FramedWrite<W, LengthDelimitedCodec>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(body) = outbound.recv().await {
        if let Err(e) = sink.send(body).await {
            log::warn!("write failed, closing connection: {e}");
            shutdown.cancel();
            break;
        }
    }
    let _ = SinkExt::<Bytes>::close(&mut sink).await;
    log::debug!("writer stopped");
}

async fn read_loop<R>(
    mut frames: FramedRead<R, LengthDelimitedCodec>,
    shared: Weak<Shared>,
    shutdown: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    let reason = loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break "connection closed by client".to_string(),
            next = frames.next() => next,
        };
        let body = match next {
            Some(Ok(body)) => body,
            Some(Err(e)) => break format!("read failed: {e}"),
            None => break "server closed the connection".to_string(),
        };
        let frame: ServerFrame = match decode_frame(&body) {
            Ok(frame) => frame,
            Err(e) => break format!("undecodable frame: {e}"),
        };
        let Some(strong) = shared.upgrade() else {
            break "client dropped".to_string();
        };
        strong.dispatch(frame);
    };

    log::debug!("reader stopped: {reason}");
    if let Some(shared) = shared.upgrade() {
        shared.fail_all(reason);
    }
}

// ============================================================================
// SocketTransport
// ============================================================================

/// Transport over one framed byte stream, usually TCP.
pub struct SocketTransport {
    shared: Arc<Shared>,
}

impl SocketTransport {
    /// Connect to the server named by `config.address`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        let timeout = config.connect_timeout();
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&config.address))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        stream.set_nodelay(true)?;
        log::info!("connected to file device at {}", config.address);
        Ok(Self::from_stream(stream, config))
    }

    /// Run the protocol over an already open stream.
    ///
    /// Spawns the reader and writer tasks, so it must be called inside a
    /// tokio runtime.
    pub fn from_stream<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let shared = Arc::new(Shared {
            outbound: outbound_tx,
            calls: Mutex::new(CallTable::default()),
            next_id: AtomicU64::new(1),
            window: config.effective_chunk_buffer(),
            shutdown: shutdown.clone(),
        });

        let frames = FramedRead::new(reader, frame_codec(config.max_frame_len));
        let sink = FramedWrite::new(writer, frame_codec(config.max_frame_len));
        tokio::spawn(write_loop(sink, outbound_rx, shutdown.clone()));
        tokio::spawn(read_loop(frames, Arc::downgrade(&shared), shutdown));

        Self { shared }
    }

    /// Calls awaiting a reply or still streaming.
    pub fn pending_calls(&self) -> usize {
        self.shared.calls.lock().calls.len()
    }

    /// Whether the connection has gone away.
    pub fn is_closed(&self) -> bool {
        self.shared.calls.lock().closed.is_some()
    }
}

impl std::fmt::Debug for SocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketTransport")
            .field("pending_calls", &self.pending_calls())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl FileDeviceTransport for SocketTransport {
    async fn scan_directory(&self, request: ScanRequest) -> Result<(), TransportError> {
        let (tx, rx) = oneshot::channel();
        let id = self.shared.register(Call::Scan(tx))?;
        let _guard = CallGuard { id, shared: self.shared.clone() };
        self.shared.send(&ClientFrame::Scan { id, path: request.path })?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    async fn is_file_exists(&self, request: ExistsRequest) -> Result<bool, TransportError> {
        let (tx, rx) = oneshot::channel();
        let id = self.shared.register(Call::Exists(tx))?;
        let _guard = CallGuard { id, shared: self.shared.clone() };
        self.shared.send(&ClientFrame::Exists { id, path: request.path })?;
        rx.await.map_err(|_| TransportError::Closed)?
    }

    async fn search(&self, request: SearchRequest) -> Result<ChunkStream, TransportError> {
        let state = Arc::new(Mutex::new(SearchState::default()));
        let id = self.shared.register(Call::Search(state.clone()))?;
        let guard = CallGuard { id, shared: self.shared.clone() };
        let window = u32::try_from(self.shared.window).unwrap_or(u32::MAX);
        self.shared.send(&ClientFrame::Search { id, request, window })?;
        log::debug!("search {id} opened with a window of {window}");
        Ok(ChunkReceiver { state, guard }.boxed())
    }
}
