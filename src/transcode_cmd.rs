//! `codecompass transcode`: run the transcoder over captured upstream bytes.
//!
//! Reads a raw upstream response body from a file or stdin, feeds it to a
//! [`Transcoder`] in fixed-size reads, and writes the resulting SSE frames
//! to stdout. Useful for inspecting what a browser would receive for a
//! captured backend stream, and for checking how a given read size interacts
//! with the chunk-boundary policy.

use anyhow::{bail, Context, Result};
use codecompass_core::{TranscodeStats, Transcoder, TranscoderOptions};
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Default read size, similar to a typical transport chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Transcodes `input` (or stdin) to stdout and prints stats to stderr.
pub async fn run_transcode(
    input: Option<&Path>,
    options: TranscoderOptions,
    chunk_size: usize,
) -> Result<()> {
    if chunk_size == 0 {
        bail!("--chunk-size must be > 0");
    }

    let reader: Box<dyn AsyncRead + Unpin> = match input {
        Some(path) => Box::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open input: {}", path.display()))?,
        ),
        None => {
            if atty::is(atty::Stream::Stdin) {
                bail!("no input: pass --input <FILE> or pipe captured upstream bytes on stdin");
            }
            Box::new(tokio::io::stdin())
        }
    };

    let mut stdout = tokio::io::stdout();
    let stats = transcode_reader(reader, &mut stdout, options, chunk_size).await?;
    stdout.flush().await?;

    eprintln!(
        "chunks: {}  documents: {}  frames: {}  skipped: {}",
        stats.chunks, stats.documents, stats.frames, stats.skipped
    );
    Ok(())
}

/// Core loop shared with tests: read, feed, write frames.
pub async fn transcode_reader<R, W>(
    mut reader: R,
    writer: &mut W,
    options: TranscoderOptions,
    chunk_size: usize,
) -> Result<TranscodeStats>
where
    R: AsyncRead + Unpin,
    W: tokio::io::AsyncWrite + Unpin,
{
    let mut transcoder = Transcoder::new(options);
    let mut buf = vec![0u8; chunk_size];

    loop {
        let n = reader.read(&mut buf).await.context("Failed to read input")?;
        if n == 0 {
            break;
        }
        let out = transcoder.feed(&buf[..n]);
        for reason in &out.skipped {
            tracing::debug!(%reason, "skipped fragment");
        }
        for frame in out.frames {
            writer.write_all(frame.to_sse().as_bytes()).await?;
        }
    }

    for frame in transcoder.finish().frames {
        writer.write_all(frame.to_sse().as_bytes()).await?;
    }

    Ok(transcoder.stats())
}

#[cfg(test)]
mod tests {
    use super::*;
    use codecompass_core::envelope::encode_delta_document;
    use codecompass_core::BoundaryPolicy;

    fn captured() -> String {
        ["Rust", " is", " fun"]
            .iter()
            .map(|d| encode_delta_document(d))
            .collect()
    }

    #[tokio::test]
    async fn test_single_read_forwards_everything() {
        let input = captured();
        let mut out = Vec::new();
        let stats = transcode_reader(
            input.as_bytes(),
            &mut out,
            TranscoderOptions::default(),
            DEFAULT_CHUNK_SIZE,
        )
        .await
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "data: {\"content\":\"Rust\"}\n\n\
             data: {\"content\":\" is\"}\n\n\
             data: {\"content\":\" fun\"}\n\n"
        );
        assert_eq!(stats.frames, 3);
    }

    #[tokio::test]
    async fn test_small_reads_need_carry() {
        let input = captured();

        let mut dropped = Vec::new();
        let drop_stats = transcode_reader(
            input.as_bytes(),
            &mut dropped,
            TranscoderOptions::default(),
            7,
        )
        .await
        .unwrap();
        assert!(drop_stats.frames < 3);

        let mut carried = Vec::new();
        let carry = TranscoderOptions {
            policy: BoundaryPolicy::Carry,
            ..TranscoderOptions::default()
        };
        let carry_stats = transcode_reader(input.as_bytes(), &mut carried, carry, 7)
            .await
            .unwrap();
        assert_eq!(carry_stats.frames, 3);
        assert_eq!(carry_stats.skipped, 0);
    }
}
