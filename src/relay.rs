//! The upstream-to-client relay stream.
//!
//! [`relay`] drives one sequential loop per request: wait for the next
//! upstream chunk, feed it to a [`Transcoder`], yield each resulting frame
//! as SSE bytes, repeat. Output order is input order.
//!
//! # Termination
//!
//! - Upstream ends: remaining frames are flushed and the stream ends
//!   normally. No trailing event is sent.
//! - Upstream read fails or stays idle past the timeout: one `Err` is
//!   yielded and the stream ends. The HTTP layer aborts the response, which
//!   the client sees as an interrupted stream.
//! - Client goes away: the HTTP layer drops this stream, which drops the
//!   upstream response and releases its connection.

use bytes::Bytes;
use codecompass_core::{FragmentError, Transcoder};
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::Span;

use crate::context::RequestContext;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream read failed: {0}")]
    Read(#[source] BoxError),

    #[error("upstream idle for {0:?}")]
    IdleTimeout(Duration),
}

/// Re-frames an upstream byte stream into client SSE bytes.
///
/// The returned stream is polled inside `ctx.span`.
pub fn relay<S, E>(
    ctx: RequestContext,
    upstream: S,
) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let span = ctx.span.clone();
    let frames = async_stream::stream! {
        let mut guard = RelayGuard::new(&ctx);
        let mut transcoder = Transcoder::new(ctx.transcoder);
        let mut upstream = Box::pin(upstream);

        loop {
            let next = match tokio::time::timeout(ctx.idle_timeout, upstream.next()).await {
                Ok(next) => next,
                Err(_) => {
                    tracing::error!(
                        idle_secs = ctx.idle_timeout.as_secs(),
                        "upstream idle timeout; aborting stream"
                    );
                    guard.finish();
                    yield Err(RelayError::IdleTimeout(ctx.idle_timeout));
                    return;
                }
            };

            match next {
                Some(Ok(chunk)) => {
                    let out = transcoder.feed(&chunk);
                    log_skips(&out.skipped);
                    for frame in out.frames {
                        yield Ok(Bytes::from(frame.to_sse()));
                    }
                }
                Some(Err(err)) => {
                    tracing::error!(error = %err, "upstream read failed; aborting stream");
                    guard.finish();
                    yield Err(RelayError::Read(Box::new(err)));
                    return;
                }
                None => break,
            }
        }

        let out = transcoder.finish();
        log_skips(&out.skipped);
        for frame in out.frames {
            yield Ok(Bytes::from(frame.to_sse()));
        }

        let stats = transcoder.stats();
        tracing::info!(
            chunks = stats.chunks,
            frames = stats.frames,
            skipped = stats.skipped,
            "stream complete"
        );
        guard.finish();
    };
    in_span(span, frames)
}

/// Enters `span` around every poll of `stream`.
fn in_span<S: Stream>(span: Span, stream: S) -> impl Stream<Item = S::Item> {
    let mut stream = Box::pin(stream);
    futures_util::stream::poll_fn(move |cx| {
        let _entered = span.enter();
        stream.as_mut().poll_next(cx)
    })
}

fn log_skips(skipped: &[FragmentError]) {
    for reason in skipped {
        tracing::debug!(%reason, "skipped upstream fragment");
    }
}

/// Notes when a relay is dropped before it finished, i.e. the client
/// disconnected and the upstream connection was released early.
struct RelayGuard {
    span: Span,
    finished: bool,
}

impl RelayGuard {
    fn new(ctx: &RequestContext) -> Self {
        Self {
            span: ctx.span.clone(),
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.finished {
            let _entered = self.span.enter();
            tracing::info!("client disconnected; upstream connection released");
        }
    }
}
