//! Line demuxing for child process output streams.
//!
//! yt-dlp rewrites its progress display in place with carriage returns, and
//! those `\r`-terminated updates keep coming when its output is piped.
//! `BufReadExt::lines()` would sit on them until a `\n` arrived, so progress
//! would not surface live. This reader yields lines delimited by `\n` or
//! `\r`, with `\r\n` counted as a single terminator.
//!
//! A chunk may carry zero, one, or many terminators, and a line may span
//! chunks; the partial tail is buffered across reads and flushed as a final
//! line at end of stream. Terminators are stripped, nothing else is: empty
//! lines are yielded too, since deciding relevance is the parser's job, and
//! the yielded lines are identical for every chunking of the same bytes.

use std::io;

use memchr::memchr2;
use tokio::io::{AsyncRead, AsyncReadExt};

pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
    /// The previous line ended with a `\r` sitting at the very end of a
    /// chunk; a `\n` arriving first in the next chunk belongs to it.
    swallow_lf: bool,
    eof: bool,
    scratch: [u8; 4096],
}

impl<R> LineReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
            swallow_lf: false,
            eof: false,
            scratch: [0u8; 4096],
        }
    }

    /// Returns the next line from the stream, or `None` at end of stream.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.swallow_lf {
                if let Some(&b'\n') = self.pending.first() {
                    self.pending.remove(0);
                    self.swallow_lf = false;
                } else if !self.pending.is_empty() || self.eof {
                    self.swallow_lf = false;
                }
            }

            if let Some(idx) = memchr2(b'\n', b'\r', &self.pending) {
                let delim = self.pending[idx];
                let line_bytes: Vec<u8> = self.pending.drain(..=idx).collect();
                let line = String::from_utf8_lossy(&line_bytes[..idx]).into_owned();

                if delim == b'\r' {
                    match self.pending.first() {
                        Some(&b'\n') => {
                            self.pending.remove(0);
                        }
                        Some(_) => {}
                        // The paired `\n`, if any, has not arrived yet.
                        None => self.swallow_lf = !self.eof,
                    }
                }
                return Ok(Some(line));
            }

            if self.eof {
                if self.pending.is_empty() {
                    return Ok(None);
                }
                let line = String::from_utf8_lossy(&self.pending).into_owned();
                self.pending.clear();
                return Ok(Some(line));
            }

            let n = self.inner.read(&mut self.scratch).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&self.scratch[..n]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Test reader that returns exactly one preset chunk per `read` call.
    struct ChunkedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl ChunkedReader {
        fn new<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> Self {
            Self {
                chunks: chunks.into_iter().collect(),
            }
        }
    }

    impl AsyncRead for ChunkedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(chunk) = self.chunks.pop_front() {
                buf.put_slice(&chunk);
            }
            Poll::Ready(Ok(()))
        }
    }

    async fn lines_of(chunks: Vec<Vec<u8>>) -> Vec<String> {
        let mut reader = LineReader::new(ChunkedReader::new(chunks));
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn splits_on_lf_cr_and_crlf() {
        let lines = lines_of(vec![b"one\rtwo\nthree\r\nfour".to_vec()]).await;
        assert_eq!(lines, vec!["one", "two", "three", "four"]);
    }

    #[tokio::test]
    async fn preserves_empty_lines() {
        let lines = lines_of(vec![b"a\n\nb\n".to_vec()]).await;
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn flushes_trailing_unterminated_content() {
        let lines = lines_of(vec![b"last line no newline".to_vec()]).await;
        assert_eq!(lines, vec!["last line no newline"]);
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let lines = lines_of(vec![]).await;
        assert!(lines.is_empty());
    }

    #[tokio::test]
    async fn crlf_split_across_chunks_is_one_terminator() {
        let lines = lines_of(vec![b"one\r".to_vec(), b"\ntwo\n".to_vec()]).await;
        assert_eq!(lines, vec!["one", "two"]);
    }

    #[tokio::test]
    async fn line_spanning_many_chunks() {
        let lines = lines_of(vec![
            b"[down".to_vec(),
            b"load]  4".to_vec(),
            b"2.0%\rnext".to_vec(),
        ])
        .await;
        assert_eq!(lines, vec!["[download]  42.0%", "next"]);
    }

    #[tokio::test]
    async fn chunking_does_not_change_the_yielded_lines() {
        let data = b"alpha\nbeta\r\ngamma\rdelta\n\ntail";
        let expected = lines_of(vec![data.to_vec()]).await;
        assert_eq!(expected, vec!["alpha", "beta", "gamma", "delta", "", "tail"]);

        for split in 1..data.len() {
            let chunks = vec![data[..split].to_vec(), data[split..].to_vec()];
            assert_eq!(lines_of(chunks).await, expected, "split at {}", split);
        }

        let byte_at_a_time: Vec<Vec<u8>> = data.iter().map(|&b| vec![b]).collect();
        assert_eq!(lines_of(byte_at_a_time).await, expected);
    }
}
