use core::pin::Pin;
use core::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::Stream;

use super::{BoxError, PutBody};

/// Default part size; S3 rejects multipart parts smaller than 5 MiB (except the last one).
pub const PART_SIZE: usize = 6 * 1024 * 1024; // 6 MiB

/// Turn a [`PutBody`] into a stream of fixed-size [`bytes::Bytes`].
///
/// Buffers and re-streams the underlying stream bytes into parts of exactly `part_size` bytes,
/// except for the final part which holds whatever remains. Errors from the underlying stream are
/// forwarded as soon as they are seen and the stream ends after the first error.
pub struct PartChunker {
    body: PutBody,
    buffer: BytesMut,
    part_size: usize,
    done: bool,
}

impl PartChunker {
    pub fn new(body: PutBody) -> Self {
        Self::with_part_size(body, PART_SIZE)
    }

    pub fn with_part_size(body: PutBody, part_size: usize) -> Self {
        Self {
            body,
            buffer: BytesMut::with_capacity(part_size),
            part_size,
            done: false,
        }
    }
}

impl Stream for PartChunker {
    type Item = std::result::Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.buffer.len() >= this.part_size {
                return Poll::Ready(Some(Ok(this.buffer.split_to(this.part_size).freeze())));
            }
            if this.done {
                if this.buffer.is_empty() {
                    return Poll::Ready(None);
                }
                return Poll::Ready(Some(Ok(this.buffer.split().freeze())));
            }
            match this.body.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.buffer.extend_from_slice(&bytes),
                Poll::Ready(Some(Err(e))) => {
                    this.done = true;
                    this.buffer.clear();
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => this.done = true,
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
