use core::pin::Pin;
use core::task::{Context, Poll};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, Stream, StreamExt};

use darkroom_objectstore::{BoxError, PutBody};

/// Raw client payload of the form `<metadata-prefix>,<base64-body>`, as a stream of chunks.
pub type PayloadBody = BoxStream<'static, std::result::Result<Bytes, BoxError>>;

/// Longest metadata prefix accepted before the `,` separator.
const MAX_PREFIX_LEN: usize = 1024;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("missing ',' separator")]
    MissingSeparator,
    #[error("metadata prefix longer than 1024 bytes")]
    PrefixTooLong,
    #[error("empty image body")]
    EmptyBody,
    #[error("unreadable payload: {0}")]
    Unreadable(#[source] BoxError),
    #[error("invalid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("data after base64 padding")]
    DataAfterPadding,
    #[error("truncated base64 group")]
    TruncatedGroup,
}

pub struct PayloadDecoder;

impl PayloadDecoder {
    /// Consume the payload up to and including the first `,` and return a lazy stream of the
    /// decoded image bytes.
    ///
    /// Everything that can be checked without decoding (an empty payload, a missing separator or
    /// an empty body) fails here. Base64 errors are yielded by the returned stream once the
    /// offending group is reached.
    pub async fn open(mut input: PayloadBody) -> std::result::Result<DecodedPayload, DecodeError> {
        let mut prefix_len = 0;
        let mut head = loop {
            let chunk = match input.next().await {
                Some(chunk) => chunk.map_err(DecodeError::Unreadable)?,
                None if prefix_len == 0 => return Err(DecodeError::Empty),
                None => return Err(DecodeError::MissingSeparator),
            };
            let separator = chunk.iter().position(|b| *b == b',');
            prefix_len += separator.unwrap_or(chunk.len());
            if prefix_len > MAX_PREFIX_LEN {
                return Err(DecodeError::PrefixTooLong);
            }
            if let Some(i) = separator {
                break strip_line_breaks(chunk.slice(i + 1..));
            }
        };

        while head.is_empty() {
            head = match input.next().await {
                Some(chunk) => strip_line_breaks(chunk.map_err(DecodeError::Unreadable)?),
                None => return Err(DecodeError::EmptyBody),
            };
        }

        Ok(DecodedPayload {
            input,
            head: Some(head),
            pending: BytesMut::new(),
            padded: false,
            done: false,
        })
    }

    /// [`PayloadDecoder::open`] over a payload that is already in memory.
    pub async fn from_bytes(
        payload: impl Into<Bytes>,
    ) -> std::result::Result<DecodedPayload, DecodeError> {
        let payload = payload.into();
        Self::open(stream::once(async move { Ok(payload) }).boxed()).await
    }
}

/// Drop CR and LF, so wrapped base64 (eg 76-column MIME output) and trailing newlines decode.
fn strip_line_breaks(chunk: Bytes) -> Bytes {
    if !chunk.iter().any(|b| *b == b'\r' || *b == b'\n') {
        return chunk;
    }
    chunk
        .iter()
        .copied()
        .filter(|b| *b != b'\r' && *b != b'\n')
        .collect::<Vec<u8>>()
        .into()
}

/// Pull-based stream of decoded image bytes. Finite and not restartable.
pub struct DecodedPayload {
    input: PayloadBody,
    head: Option<Bytes>,
    // base64 text not yet decoded; always shorter than one 4-character group between polls
    pending: BytesMut,
    padded: bool,
    done: bool,
}

impl DecodedPayload {
    /// Adapt into an object store upload body. Decode errors travel through the upload as
    /// [`BoxError`]s and can be downcast back to [`DecodeError`].
    pub fn into_body(self) -> PutBody {
        self.map(|r| r.map_err(BoxError::from)).boxed()
    }

    fn fail(&mut self, e: DecodeError) -> Poll<Option<std::result::Result<Bytes, DecodeError>>> {
        self.done = true;
        self.pending.clear();
        Poll::Ready(Some(Err(e)))
    }
}

impl Stream for DecodedPayload {
    type Item = std::result::Result<Bytes, DecodeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }

            let chunk = match this.head.take() {
                Some(head) => head,
                None => match this.input.as_mut().poll_next(cx) {
                    Poll::Ready(Some(Ok(chunk))) => strip_line_breaks(chunk),
                    Poll::Ready(Some(Err(e))) => return this.fail(DecodeError::Unreadable(e)),
                    Poll::Ready(None) => {
                        if this.pending.is_empty() {
                            this.done = true;
                            return Poll::Ready(None);
                        }
                        if this.padded {
                            return this.fail(DecodeError::DataAfterPadding);
                        }
                        return this.fail(DecodeError::TruncatedGroup);
                    }
                    Poll::Pending => return Poll::Pending,
                },
            };

            if chunk.is_empty() {
                continue;
            }
            if this.padded {
                return this.fail(DecodeError::DataAfterPadding);
            }

            this.pending.extend_from_slice(&chunk);
            let usable = this.pending.len() / 4 * 4;
            if usable == 0 {
                continue;
            }
            let text = this.pending.split_to(usable);
            match STANDARD.decode(&text) {
                Ok(decoded) => {
                    this.padded = text.ends_with(b"=");
                    if decoded.is_empty() {
                        continue;
                    }
                    return Poll::Ready(Some(Ok(Bytes::from(decoded))));
                }
                Err(e) => return this.fail(e.into()),
            }
        }
    }
}
