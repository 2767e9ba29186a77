//! Request and response bodies.
//!
//! A body is either held in memory ([`Body::Full`]), which can be sent any number
//! of times, or produced by a one-shot stream. Streams are wrapped in a
//! [`StreamGuard`] that remembers when the producer has been drained. Once drained,
//! every further attempt to read yields [`Error::StreamConsumed`]; nothing is
//! cached for replay.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use crate::Error;

/// Blocking body producer.
pub type BoxIter = Box<dyn Iterator<Item = io::Result<Bytes>> + Send>;

/// Async body producer.
pub type BoxStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// One-shot consumption tracker around a body producer.
pub struct StreamGuard<S> {
    source: Option<S>,
    drained: bool,
}

impl<S> StreamGuard<S> {
    /// Wrap a producer.
    pub fn new(source: S) -> Self {
        StreamGuard {
            source: Some(source),
            drained: false,
        }
    }

    /// Tell if the producer has been run to the end (or released).
    ///
    /// Once `true`, this never becomes `false` again.
    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Drop the producer without reading the rest of it.
    pub fn release(&mut self) {
        self.source = None;
        self.drained = true;
    }

    fn finish(&mut self) {
        trace!("Body stream drained");
        self.release();
    }
}

impl StreamGuard<BoxIter> {
    /// Next chunk from the producer, `Ok(None)` at the end.
    pub fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        if self.drained {
            return Err(Error::StreamConsumed);
        }

        let Some(source) = self.source.as_mut() else {
            return Err(Error::StreamConsumed);
        };

        match source.next() {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => {
                self.release();
                Err(Error::Read(e.to_string()))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Consume the rest of the producer.
    pub fn read_all(&mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk()? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl StreamGuard<BoxStream> {
    /// Next chunk from the producer, `Ok(None)` at the end.
    pub async fn next_chunk_async(&mut self) -> Result<Option<Bytes>, Error> {
        if self.drained {
            return Err(Error::StreamConsumed);
        }

        let Some(source) = self.source.as_mut() else {
            return Err(Error::StreamConsumed);
        };

        match source.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => {
                self.release();
                Err(Error::Read(e.to_string()))
            }
            None => {
                self.finish();
                Ok(None)
            }
        }
    }

    /// Consume the rest of the producer.
    pub async fn read_all_async(&mut self) -> Result<Bytes, Error> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next_chunk_async().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf.freeze())
    }
}

impl Iterator for StreamGuard<BoxIter> {
    type Item = Result<Bytes, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

impl Stream for StreamGuard<BoxStream> {
    type Item = Result<Bytes, Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.drained {
            return Poll::Ready(Some(Err(Error::StreamConsumed)));
        }

        let Some(source) = this.source.as_mut() else {
            return Poll::Ready(Some(Err(Error::StreamConsumed)));
        };

        match source.as_mut().poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
            Poll::Ready(Some(Err(e))) => {
                this.release();
                Poll::Ready(Some(Err(Error::Read(e.to_string()))))
            }
            Poll::Ready(None) => {
                this.finish();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// A request or response body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// In-memory body. Can be resent.
    Full(Bytes),
    /// Blocking one-shot producer.
    Stream(StreamGuard<BoxIter>),
    /// Async one-shot producer.
    AsyncStream(StreamGuard<BoxStream>),
}

impl Body {
    /// Body from a blocking producer of chunks.
    pub fn from_chunks<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = io::Result<Bytes>>,
        I::IntoIter: Send + 'static,
    {
        Body::Stream(StreamGuard::new(Box::new(iter.into_iter())))
    }

    /// Body from an async producer of chunks.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        Body::AsyncStream(StreamGuard::new(Box::pin(stream)))
    }

    /// Tell if there is no body at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Full(b) => b.is_empty(),
            _ => false,
        }
    }

    /// Tell if the body is a stream.
    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_) | Body::AsyncStream(_))
    }

    /// Tell if the body is a stream that has already been drained.
    pub fn is_consumed(&self) -> bool {
        match self {
            Body::Stream(s) => s.is_drained(),
            Body::AsyncStream(s) => s.is_drained(),
            _ => false,
        }
    }

    /// Read the entire body using blocking reads.
    ///
    /// For streams this consumes the producer.
    pub fn read_all(&mut self) -> Result<Bytes, Error> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(b) => Ok(b.clone()),
            Body::Stream(s) => s.read_all(),
            Body::AsyncStream(_) => Err(Error::StreamMode),
        }
    }

    /// Read the entire body.
    ///
    /// For streams this consumes the producer.
    pub async fn read_all_async(&mut self) -> Result<Bytes, Error> {
        match self {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(b) => Ok(b.clone()),
            Body::Stream(s) => s.read_all(),
            Body::AsyncStream(s) => s.read_all_async().await,
        }
    }

    /// Release any underlying producer without reading it.
    pub fn close(&mut self) {
        match self {
            Body::Stream(s) => s.release(),
            Body::AsyncStream(s) => s.release(),
            _ => {}
        }
    }

    /// Move the body out for a resend of the same request.
    ///
    /// In-memory bodies are cheaply cloned. Streams are handed over as is; a
    /// drained stream can't be sent again.
    pub(crate) fn take_for_resend(&mut self) -> Result<Body, Error> {
        if self.is_consumed() {
            return Err(Error::StreamConsumed);
        }

        match &*self {
            Body::Empty => Ok(Body::Empty),
            Body::Full(b) => Ok(Body::Full(b.clone())),
            _ => Ok(std::mem::take(self)),
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            Body::Empty
        } else {
            Body::Full(b)
        }
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::from(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Body {
    fn from(s: &'static [u8]) -> Self {
        Body::from(Bytes::from_static(s))
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Body::from(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::from(Bytes::from(s))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => write!(f, "Empty"),
            Body::Full(b) => write!(f, "Full({} bytes)", b.len()),
            Body::Stream(s) => write!(f, "Stream(drained: {})", s.is_drained()),
            Body::AsyncStream(s) => write!(f, "AsyncStream(drained: {})", s.is_drained()),
        }
    }
}
