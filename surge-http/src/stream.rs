//! Newline-delimited JSON change streams
//!
//! The autoupdate endpoint answers with one JSON object per line, each
//! mapping `collection/id/field` keys to the new value of that field. The
//! decoder keeps values raw; consumers pick the keys they care about.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

use crate::errors::StreamError;

/// Longest change line accepted
///
/// Lines carrying whole committee trees or poll results get large.
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Key of one field of one object, `collection/id/field`
pub fn fqfield(collection: &str, id: impl fmt::Display, field: &str) -> String {
    format!("{}/{}/{}", collection, id, field)
}

/// One decoded line of a change stream
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet(HashMap<String, Box<RawValue>>);

impl ChangeSet {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Raw JSON of a key, `null` included
    pub fn raw(&self, key: &str) -> Option<&RawValue> {
        self.0.get(key).map(|value| value.as_ref())
    }

    /// Decode the value of a key
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, serde_json::Error> {
        self.raw(key)
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

type BodyReader = StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>;

/// Lazily decoded sequence of [`ChangeSet`]s
///
/// Ends with the body or after the first error; a broken line is fatal to
/// the whole stream. Blank lines are skipped.
pub struct ChangeStream {
    lines: FramedRead<BodyReader, LinesCodec>,
    failed: bool,
}

impl ChangeStream {
    /// Decode the body of a streaming response
    pub fn from_response(response: reqwest::Response) -> Self {
        Self::from_bytes(response.bytes_stream().map_err(io::Error::other))
    }

    /// Decode any byte stream
    pub fn from_bytes<S>(bytes: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let reader = StreamReader::new(bytes.boxed());
        Self {
            lines: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
            failed: false,
        }
    }
}

impl fmt::Debug for ChangeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeStream")
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl Stream for ChangeStream {
    type Item = Result<ChangeSet, StreamError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }

        loop {
            let line = match self.lines.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(Ok(line))) => line,
                Poll::Ready(Some(Err(error))) => {
                    self.failed = true;
                    let error = match error {
                        LinesCodecError::MaxLineLengthExceeded => {
                            StreamError::LineTooLong(MAX_LINE_BYTES)
                        }
                        // Bytes that are not UTF-8 are bad content, not a broken read
                        LinesCodecError::Io(error) if error.kind() == io::ErrorKind::InvalidData => {
                            StreamError::Decode(error.to_string())
                        }
                        LinesCodecError::Io(error) => StreamError::Read(error.to_string()),
                    };
                    return Poll::Ready(Some(Err(error)));
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            let decoded = ChangeSet::parse(&line).map_err(|e| StreamError::Decode(e.to_string()));
            if decoded.is_err() {
                self.failed = true;
            }
            return Poll::Ready(Some(decoded));
        }
    }
}
