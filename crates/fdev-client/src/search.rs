//! Streaming search results.
//!
//! [`SearchStream`] turns the raw chunk stream of one search call into a
//! lazy stream of [`FileEntry`] values:
//!
//! ```text
//!   transport chunks ──▶ decode_all ──▶ pending entries ──▶ poll_next
//!        ▲                                     │
//!        └──── pulled only when pending is ────┘
//!              empty and the consumer polls
//! ```
//!
//! Everything happens inside `poll_next` on the consumer's task. A chunk is
//! decoded as a whole, so a malformed chunk fails before any of its entries
//! are yielded. The cancellation token is checked on every poll and raced
//! against the next chunk; once it fires the call is dropped and nothing
//! further is yielded.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use fdev_types::{CodecError, FileEntry, codec};
use futures::future::BoxFuture;
use futures::stream::FusedStream;
use futures::{Stream, StreamExt, TryStreamExt, ready};
use thiserror::Error;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::transport::{ChunkStream, TransportError};

/// Errors that end a search stream.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The call could not be opened or failed mid-stream.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A chunk was not a whole number of records.
    #[error(transparent)]
    Malformed(#[from] CodecError),
}

/// How a search stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The server finished the search.
    Completed,
    /// The cancellation token fired.
    Cancelled,
    /// An error was yielded.
    Failed,
}

enum State {
    Opening(BoxFuture<'static, Result<ChunkStream, TransportError>>),
    Streaming(ChunkStream),
    Done,
}

enum Step {
    Opened(Result<ChunkStream, TransportError>),
    Chunk(Option<Result<bytes::Bytes, TransportError>>),
}

/// Lazy, cancellable stream of search results.
///
/// Finite and single-use: iterating again needs a new search call.
pub struct SearchStream {
    state: State,
    pending: std::vec::IntoIter<FileEntry>,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    termination: Option<Termination>,
    chunks: u64,
    yielded: u64,
    span: tracing::Span,
}

impl SearchStream {
    /// Stream the results of a call that is opened on first poll.
    pub fn new(
        open: BoxFuture<'static, Result<ChunkStream, TransportError>>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_state(State::Opening(open), cancel)
    }

    /// Stream the results of an already open call.
    pub fn from_chunks(chunks: ChunkStream, cancel: CancellationToken) -> Self {
        Self::with_state(State::Streaming(chunks), cancel)
    }

    fn with_state(state: State, cancel: CancellationToken) -> Self {
        Self {
            state,
            pending: Vec::new().into_iter(),
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            cancel,
            termination: None,
            chunks: 0,
            yielded: 0,
            span: tracing::Span::current(),
        }
    }

    /// Attach the span search progress is logged under.
    pub(crate) fn instrument(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    /// How the stream ended, or `None` while it is still live.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// The token that cancels this stream.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the stream. Same as cancelling its token.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Drain the stream into a vector.
    ///
    /// Cancellation ends the drain early with the entries received so far.
    pub async fn try_collect_all(self) -> Result<Vec<FileEntry>, SearchError> {
        self.try_collect().await
    }

    fn finish(&mut self, termination: Termination) {
        // Dropping the chunk stream cancels the underlying call.
        self.state = State::Done;
        self.pending = Vec::new().into_iter();
        self.termination = Some(termination);
        tracing::debug!(
            ?termination,
            chunks = self.chunks,
            entries = self.yielded,
            "search stream finished"
        );
    }

    fn fail(&mut self, error: SearchError) -> Poll<Option<Result<FileEntry, SearchError>>> {
        tracing::warn!(%error, "search stream failed");
        self.finish(Termination::Failed);
        Poll::Ready(Some(Err(error)))
    }
}

impl Stream for SearchStream {
    type Item = Result<FileEntry, SearchError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let span = this.span.clone();
        let _enter = span.enter();

        loop {
            if this.termination.is_some() {
                return Poll::Ready(None);
            }
            if this.cancel.is_cancelled() {
                this.finish(Termination::Cancelled);
                return Poll::Ready(None);
            }
            if let Some(entry) = this.pending.next() {
                this.yielded += 1;
                return Poll::Ready(Some(Ok(entry)));
            }
            if this.cancelled.as_mut().poll(cx).is_ready() {
                this.finish(Termination::Cancelled);
                return Poll::Ready(None);
            }

            let step = match &mut this.state {
                State::Opening(open) => Step::Opened(ready!(open.as_mut().poll(cx))),
                State::Streaming(chunks) => Step::Chunk(ready!(chunks.poll_next_unpin(cx))),
                State::Done => return Poll::Ready(None),
            };

            match step {
                Step::Opened(Ok(chunks)) => this.state = State::Streaming(chunks),
                Step::Opened(Err(error)) => return this.fail(error.into()),
                Step::Chunk(None) => {
                    this.finish(Termination::Completed);
                    return Poll::Ready(None);
                }
                Step::Chunk(Some(Err(error))) => return this.fail(error.into()),
                Step::Chunk(Some(Ok(chunk))) => match codec::decode_all(&chunk) {
                    Ok(entries) => {
                        this.chunks += 1;
                        tracing::trace!(chunk = this.chunks, records = entries.len(), "search chunk");
                        this.pending = entries.into_iter();
                    }
                    Err(error) => return this.fail(error.into()),
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.termination {
            Some(_) => (0, Some(0)),
            None => (self.pending.len(), None),
        }
    }
}

impl FusedStream for SearchStream {
    fn is_terminated(&self) -> bool {
        self.termination.is_some()
    }
}
