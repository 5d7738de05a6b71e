//! Typed view of the host's JSONL conversation transcript.
//!
//! Each line of a transcript is one JSON event. Only a small slice of the
//! event shape matters here: the role of the turn and the typed content
//! segments of its message. Everything else is ignored during
//! deserialization.
//!
//! Transcripts are append-only and can grow large, so [`RevLines`] walks a
//! file backwards in fixed-size chunks and [`latest_assistant_turn`] stops
//! at the first assistant turn it meets.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

/// Bytes read per backward step.
const CHUNK_SIZE: u64 = 8 * 1024;

/// Raw marker of an assistant turn, used to recognise malformed assistant lines.
const ASSISTANT_MARKER: &str = r#""role":"assistant""#;

/// One line of the transcript.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TranscriptEntry {
    /// Role carried directly on the event, for events without a message.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

/// The message payload of a transcript event.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Message {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<MessageContent>,
}

/// Message content: either a bare string or a list of typed segments.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Segments(Vec<ContentSegment>),
}

/// A typed content segment. Only text segments carry output we care about.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentSegment {
    Text {
        #[serde(default)]
        text: String,
    },
    #[serde(other)]
    Other,
}

impl TranscriptEntry {
    /// Role of this turn, preferring the message's own role.
    #[must_use]
    pub fn role(&self) -> Option<&str> {
        self.message
            .as_ref()
            .and_then(|m| m.role.as_deref())
            .or(self.role.as_deref())
    }

    /// Whether this turn was produced by the assistant.
    #[must_use]
    pub fn is_assistant(&self) -> bool {
        self.role() == Some("assistant")
    }

    /// Plain-text output of the turn: every text segment, in order, joined by newlines.
    #[must_use]
    pub fn text(&self) -> String {
        match self.message.as_ref().and_then(|m| m.content.as_ref()) {
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Segments(segments)) => segments
                .iter()
                .filter_map(|s| match s {
                    ContentSegment::Text { text } => Some(text.as_str()),
                    ContentSegment::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => String::new(),
        }
    }
}

/// Iterates the lines of a seekable reader from last to first.
///
/// Line terminators are stripped; a trailing newline at the end of the input
/// produces one leading empty line. Every byte is read and scanned once, so a
/// single very long line costs no more than many short ones.
pub struct RevLines<R> {
    reader: R,
    pos: u64,
    /// Most recently read chunk; only `chunk[..unscanned]` is still pending.
    chunk: Vec<u8>,
    unscanned: usize,
    /// Pieces of the line being assembled, newest piece first.
    pending: Vec<Vec<u8>>,
    done: bool,
}

impl<R: Read + Seek> RevLines<R> {
    /// Positions the iterator at the end of `reader`.
    pub fn new(mut reader: R) -> io::Result<Self> {
        let pos = reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader,
            pos,
            chunk: Vec::new(),
            unscanned: 0,
            pending: Vec::new(),
            done: false,
        })
    }

    /// Park the unscanned part of the current chunk and read the previous
    /// one. Returns false at start of input.
    fn fill(&mut self) -> io::Result<bool> {
        self.chunk.truncate(self.unscanned);
        if !self.chunk.is_empty() {
            self.pending.push(std::mem::take(&mut self.chunk));
        }
        if self.pos == 0 {
            return Ok(false);
        }

        let size = CHUNK_SIZE.min(self.pos);
        self.pos -= size;
        self.reader.seek(SeekFrom::Start(self.pos))?;

        let mut chunk = vec![0; size as usize];
        self.reader.read_exact(&mut chunk)?;
        self.unscanned = chunk.len();
        self.chunk = chunk;
        Ok(true)
    }

    /// Join `head` with the parked pieces, in file order.
    fn take_line(&mut self, head: &[u8]) -> String {
        let len = head.len() + self.pending.iter().map(Vec::len).sum::<usize>();
        let mut line = Vec::with_capacity(len);
        line.extend_from_slice(head);
        for piece in self.pending.drain(..).rev() {
            line.extend_from_slice(&piece);
        }
        decode_line(&line)
    }
}

impl<R: Read + Seek> Iterator for RevLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            let scanned = &self.chunk[..self.unscanned];
            if let Some(idx) = scanned.iter().rposition(|&b| b == b'\n') {
                let head = scanned[idx + 1..].to_vec();
                self.unscanned = idx;
                return Some(Ok(self.take_line(&head)));
            }
            match self.fill() {
                Ok(true) => {}
                Ok(false) => {
                    self.done = true;
                    return Some(Ok(self.take_line(&[])));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.strip_suffix('\r').unwrap_or(&line).to_string()
}

/// Find the most recent assistant turn in an iterator of lines, newest first.
///
/// Blank lines and well-formed events of other roles are skipped. A line that
/// looks like an assistant event but fails to deserialize ends the search
/// with `None`, as does a read error.
pub fn latest_assistant_in<I>(lines_newest_first: I) -> Option<TranscriptEntry>
where
    I: IntoIterator<Item = io::Result<String>>,
{
    for line in lines_newest_first {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                debug!("transcript read failed: {}", e);
                return None;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<TranscriptEntry>(line) {
            Ok(entry) if entry.is_assistant() => return Some(entry),
            Ok(_) => {}
            Err(e) if line.contains(ASSISTANT_MARKER) => {
                debug!("latest assistant turn is malformed: {}", e);
                return None;
            }
            Err(_) => {}
        }
    }
    None
}

/// Read the most recent assistant turn from a transcript file.
///
/// Missing or unreadable files yield `None`.
#[must_use]
pub fn latest_assistant_turn(path: &Path) -> Option<TranscriptEntry> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), "cannot open transcript: {}", e);
            return None;
        }
    };
    let lines = match RevLines::new(file) {
        Ok(lines) => lines,
        Err(e) => {
            debug!(path = %path.display(), "cannot seek transcript: {}", e);
            return None;
        }
    };
    latest_assistant_in(lines)
}
