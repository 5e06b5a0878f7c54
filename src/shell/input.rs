//! Line source for the shell loop.

use std::collections::VecDeque;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// One line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputLine {
    pub text: String,
    /// True when the line was queued by the shell, e.g. after `edit`.
    pub injected: bool,
}

/// Reads lines from a reader, serving injected lines first.
pub struct InputStream<R> {
    reader: R,
    injected: VecDeque<String>,
}

impl<R> InputStream<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            injected: VecDeque::new(),
        }
    }

    /// Queue a line to be read before anything from the reader.
    pub fn inject(&mut self, line: impl Into<String>) {
        self.injected.push_back(line.into());
    }

    pub fn has_injected(&self) -> bool {
        !self.injected.is_empty()
    }

    /// The next line without its terminator, or `None` at end of input.
    pub async fn next_line(&mut self) -> io::Result<Option<InputLine>> {
        if let Some(text) = self.injected.pop_front() {
            return Ok(Some(InputLine {
                text,
                injected: true,
            }));
        }

        let mut text = String::new();
        if self.reader.read_line(&mut text).await? == 0 {
            return Ok(None);
        }
        if text.ends_with('\n') {
            text.pop();
            if text.ends_with('\r') {
                text.pop();
            }
        }
        Ok(Some(InputLine {
            text,
            injected: false,
        }))
    }
}
