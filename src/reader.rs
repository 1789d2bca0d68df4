//! The line reader (§4.2): segments an incoming byte stream into MI
//! records terminated by `\n` (optionally preceded by `\r`). Content is
//! never interpreted here — only segmented.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::warn;

/// Reads one logical MI line at a time off `inner`.
///
/// A chunk containing multiple records is still yielded one line per
/// `next_line` call (driven by the underlying buffered reader); a partial
/// record is held internally until a newline completes it.
pub struct LineReader<R> {
    inner: R,
}

impl<R: AsyncBufRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Returns `Ok(Some(line))` for a complete line with its terminator
    /// stripped, `Ok(None)` on clean EOF, or an IO error.
    pub async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let mut buffer = String::new();
        let n = self.inner.read_line(&mut buffer).await?;
        if n == 0 {
            return Ok(None);
        }
        if !buffer.ends_with('\n') {
            // EOF mid-record: a final unterminated fragment is a warning,
            // not a parsed line.
            warn!("stream ended without a trailing newline: {:?}", buffer);
            return Ok(None);
        }
        buffer.pop(); // '\n'
        if buffer.ends_with('\r') {
            buffer.pop();
        }
        Ok(Some(buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn splits_multiple_records_in_one_chunk() {
        let data = b"^done\n*stopped,reason=\"x\"\n(gdb)\n".to_vec();
        let mut reader = LineReader::new(BufReader::new(&data[..]));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("^done"));
        assert_eq!(
            reader.next_line().await.unwrap().as_deref(),
            Some("*stopped,reason=\"x\"")
        );
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("(gdb)"));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn strips_optional_carriage_return() {
        let data = b"^done\r\n".to_vec();
        let mut reader = LineReader::new(BufReader::new(&data[..]));
        assert_eq!(reader.next_line().await.unwrap().as_deref(), Some("^done"));
    }

    #[tokio::test]
    async fn unterminated_fragment_on_eof_yields_none() {
        let data = b"^don".to_vec();
        let mut reader = LineReader::new(BufReader::new(&data[..]));
        assert_eq!(reader.next_line().await.unwrap(), None);
    }
}
