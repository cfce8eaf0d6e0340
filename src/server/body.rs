//! Streamed request body aggregation
//!
//! The transport hands request bodies over as a finite stream of byte
//! chunks. The aggregator appends them into one buffer and releases the
//! buffer only once the final chunk has been seen.
//!
//! A [`CancellationFlag`] is shared between the aggregator and the request
//! lifecycle. Either side may raise it: the body stream failing (client went
//! away mid-upload) or the request being dropped before it settled. Once it
//! is raised nothing downstream may touch the store or the response.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};

use super::response::ApiError;

/// Shared "client aborted" flag for one request
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the request as aborted
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Accumulates body chunks until the last one arrives
#[derive(Debug)]
pub struct RequestBodyAggregator {
    buffer: BytesMut,
    limit: usize,
    cancel: CancellationFlag,
}

impl RequestBodyAggregator {
    /// Create an aggregator accepting at most `limit` bytes
    pub fn new(limit: usize, cancel: CancellationFlag) -> Self {
        Self {
            buffer: BytesMut::new(),
            limit,
            cancel,
        }
    }

    /// Append one chunk
    ///
    /// Returns the complete body when `last` is set. Returns `Ok(None)` for
    /// intermediate chunks and for every chunk after cancellation.
    pub fn push(&mut self, chunk: &[u8], last: bool) -> Result<Option<Bytes>, ApiError> {
        if self.cancel.is_cancelled() {
            return Ok(None);
        }

        if self.buffer.len() + chunk.len() > self.limit {
            return Err(ApiError::PayloadTooLarge(self.limit));
        }

        self.buffer.extend_from_slice(chunk);

        if last {
            Ok(Some(std::mem::take(&mut self.buffer).freeze()))
        } else {
            Ok(None)
        }
    }

    /// Drain a chunk stream into one buffer
    ///
    /// `Ok(None)` means the request was aborted: either the stream failed or
    /// the flag was raised while chunks were still arriving.
    pub async fn collect<S, E>(mut self, stream: S) -> Result<Option<Bytes>, ApiError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let stream = stream.peekable();
        futures::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => {
                    let last = stream.as_mut().peek().await.is_none();
                    if let Some(body) = self.push(&chunk, last)? {
                        return Ok(Some(body));
                    }
                    if self.cancel.is_cancelled() {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Request body stream failed");
                    self.cancel.cancel();
                    return Ok(None);
                }
            }
        }

        // Stream ended without any chunk: an empty body
        self.push(&[], true)
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, String>> {
        parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect()
    }

    #[test]
    fn test_push_waits_for_last_chunk() {
        let mut aggregator = RequestBodyAggregator::new(1024, CancellationFlag::new());

        assert_eq!(aggregator.push(b"{\"a\":", false).unwrap(), None);
        let body = aggregator.push(b"1}", true).unwrap().unwrap();
        assert_eq!(&body[..], b"{\"a\":1}");
    }

    #[test]
    fn test_push_after_cancel_is_ignored() {
        let flag = CancellationFlag::new();
        let mut aggregator = RequestBodyAggregator::new(1024, flag.clone());

        aggregator.push(b"{", false).unwrap();
        flag.cancel();
        assert_eq!(aggregator.push(b"}", true).unwrap(), None);
    }

    #[test]
    fn test_push_enforces_limit() {
        let mut aggregator = RequestBodyAggregator::new(4, CancellationFlag::new());

        aggregator.push(b"abc", false).unwrap();
        assert_eq!(
            aggregator.push(b"de", true),
            Err(ApiError::PayloadTooLarge(4))
        );
    }

    #[tokio::test]
    async fn test_collect_concatenates_chunks() {
        let aggregator = RequestBodyAggregator::new(1024, CancellationFlag::new());
        let body = stream::iter(chunks(&["{\"description\":", "\"buy milk\",", "\"completed\":false}"]));

        let collected = aggregator.collect(body).await.unwrap().unwrap();
        assert_eq!(
            &collected[..],
            br#"{"description":"buy milk","completed":false}"#
        );
    }

    #[tokio::test]
    async fn test_collect_empty_body() {
        let aggregator = RequestBodyAggregator::new(1024, CancellationFlag::new());
        let body = stream::iter(Vec::<Result<Bytes, String>>::new());

        let collected = aggregator.collect(body).await.unwrap().unwrap();
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_collect_stream_error_cancels() {
        let flag = CancellationFlag::new();
        let aggregator = RequestBodyAggregator::new(1024, flag.clone());
        let mut parts = chunks(&["{\"description\":"]);
        parts.push(Err("connection reset".to_string()));

        let collected = aggregator.collect(stream::iter(parts)).await.unwrap();
        assert!(collected.is_none());
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_collect_with_tokio_test_block_on() {
        let aggregator = RequestBodyAggregator::new(2, CancellationFlag::new());
        let body = stream::iter(chunks(&["abc"]));

        let result = tokio_test::block_on(aggregator.collect(body));
        assert_eq!(result, Err(ApiError::PayloadTooLarge(2)));
    }
}
