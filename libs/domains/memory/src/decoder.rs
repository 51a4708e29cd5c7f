//! Incremental decoder for import files.
//!
//! An import file is one top-level JSON array of message objects. The decoder
//! walks the array element by element, buffering only the bytes of the
//! element being read, so arbitrarily large exports decode in constant memory.
//! A malformed element is reported and skipped; decoding resumes at the next
//! element.

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::models::MessageRecord;

/// Elements larger than this are skipped without being buffered.
pub const MAX_RECORD_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("import input is not a JSON array (starts with {found:?})")]
    NotAnArray { found: char },

    #[error("record #{index} is malformed: {source}")]
    Malformed {
        index: u64,
        source: serde_json::Error,
    },

    #[error("record #{index} is larger than {limit} bytes")]
    Oversized { index: u64, limit: usize },

    #[error("import input ended before the closing ']'")]
    Truncated,

    #[error("failed to read import input: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// The stream cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DecodeError::NotAnArray { .. } | DecodeError::Truncated | DecodeError::Io(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Elements,
    Finished,
}

/// Pulls [`MessageRecord`]s one at a time out of a JSON array.
pub struct RecordDecoder<R> {
    reader: R,
    state: State,
    index: u64,
    max_record_bytes: usize,
    scratch: Vec<u8>,
}

impl<R> RecordDecoder<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            state: State::Start,
            index: 0,
            max_record_bytes: MAX_RECORD_BYTES,
            scratch: Vec::new(),
        }
    }

    pub fn with_max_record_bytes(mut self, limit: usize) -> Self {
        self.max_record_bytes = limit.max(1);
        self
    }

    /// Number of array elements encountered so far, valid or not.
    pub fn elements_seen(&self) -> u64 {
        self.index
    }

    /// Next element of the array.
    ///
    /// Returns `None` once the array is closed or after a fatal error has been
    /// reported.
    pub async fn next_record(&mut self) -> Option<Result<MessageRecord, DecodeError>> {
        if self.state == State::Start {
            if let Err(err) = self.open_array().await {
                self.state = State::Finished;
                return Some(Err(err));
            }
        }
        if self.state == State::Finished {
            return None;
        }

        let result = match self.skip_while(|b| b.is_ascii_whitespace() || b == b',').await {
            Ok(Some(b']')) => {
                self.reader.consume(1);
                self.state = State::Finished;
                return None;
            }
            Ok(Some(_)) => self.read_element().await,
            Ok(None) => Err(DecodeError::Truncated),
            Err(err) => Err(err.into()),
        };

        if let Err(err) = &result {
            if err.is_fatal() {
                self.state = State::Finished;
            }
        }
        Some(result)
    }

    async fn open_array(&mut self) -> Result<(), DecodeError> {
        // A UTF-8 byte order mark is tolerated in front of the array.
        match self
            .skip_while(|b| b.is_ascii_whitespace() || matches!(b, 0xEF | 0xBB | 0xBF))
            .await?
        {
            Some(b'[') => {
                self.reader.consume(1);
                self.state = State::Elements;
                Ok(())
            }
            Some(other) => Err(DecodeError::NotAnArray {
                found: char::from(other),
            }),
            None => Err(DecodeError::Truncated),
        }
    }

    /// Consume bytes matching `skip`; returns the first byte that doesn't,
    /// without consuming it.
    async fn skip_while(&mut self, skip: fn(u8) -> bool) -> std::io::Result<Option<u8>> {
        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Ok(None);
            }
            match buf.iter().position(|&b| !skip(b)) {
                Some(pos) => {
                    let next = buf[pos];
                    self.reader.consume(pos);
                    return Ok(Some(next));
                }
                None => {
                    let len = buf.len();
                    self.reader.consume(len);
                }
            }
        }
    }

    async fn read_element(&mut self) -> Result<MessageRecord, DecodeError> {
        let index = self.index;
        self.index += 1;
        self.scratch.clear();

        let mut scanner = ElementScanner::default();
        let mut oversized = false;

        loop {
            let buf = self.reader.fill_buf().await?;
            if buf.is_empty() {
                return Err(DecodeError::Truncated);
            }

            let (used, complete) = scanner.feed(buf);
            if !oversized {
                if self.scratch.len() + used > self.max_record_bytes {
                    oversized = true;
                    self.scratch = Vec::new();
                } else {
                    self.scratch.extend_from_slice(&buf[..used]);
                }
            }
            self.reader.consume(used);

            if complete {
                break;
            }
        }

        if oversized {
            return Err(DecodeError::Oversized {
                index,
                limit: self.max_record_bytes,
            });
        }

        serde_json::from_slice(&self.scratch).map_err(|source| DecodeError::Malformed { index, source })
    }
}

/// Finds where one JSON value ends, across buffer boundaries.
#[derive(Debug, Default)]
struct ElementScanner {
    started: bool,
    scalar: bool,
    depth: u32,
    in_string: bool,
    escaped: bool,
}

impl ElementScanner {
    /// Returns how many bytes of `bytes` belong to the element and whether it
    /// is complete.
    fn feed(&mut self, bytes: &[u8]) -> (usize, bool) {
        for (i, &b) in bytes.iter().enumerate() {
            if !self.started {
                self.started = true;
                match b {
                    b'{' | b'[' => self.depth = 1,
                    b'"' => self.in_string = true,
                    _ => self.scalar = true,
                }
                continue;
            }

            // A bare token runs to the next separator, spaces included.
            if self.scalar {
                if b == b',' || b == b']' {
                    return (i, true);
                }
                continue;
            }

            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return (i + 1, true);
                    }
                }
                continue;
            }

            match b {
                b'"' => self.in_string = true,
                b'{' | b'[' => self.depth += 1,
                b'}' | b']' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return (i + 1, true);
                    }
                }
                _ => {}
            }
        }
        (bytes.len(), false)
    }
}
