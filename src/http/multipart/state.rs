//! Encoder states and cursor
//!
//! ```text
//! FormFields -> FileHead (files remain) | BodyFoot (no files)
//! FileHead   -> Select
//! Select     -> RawValue | TextValue | FileChunk
//! RawValue   -> FileFoot
//! TextValue  -> FileFoot
//! FileChunk  -> FileChunk (bytes remain) | FileFoot (exhausted)
//! FileFoot   -> NextFile
//! NextFile   -> FileHead (files remain) | BodyFoot
//! BodyFoot   -> BodyEnd
//! BodyEnd    terminal
//! ```

use std::fmt;

/// Encoder state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// All plain form fields, as one joined batch
    FormFields,
    /// Boundary and part headers of the current file
    FileHead,
    /// Pick the emission kind for the current file's source
    Select,
    /// In-memory bytes, emitted whole
    RawValue,
    /// In-memory text, emitted whole as UTF-8
    TextValue,
    /// Up to `chunk_size` bytes read from the current file's reader
    FileChunk,
    /// CRLF closing the current file part
    FileFoot,
    /// Advance to the next file, if any
    NextFile,
    /// Closing boundary
    BodyFoot,
    /// Nothing left to emit
    BodyEnd,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::FormFields => "form_fields",
            State::FileHead => "file_head",
            State::Select => "select",
            State::RawValue => "raw_value",
            State::TextValue => "text_value",
            State::FileChunk => "file_chunk",
            State::FileFoot => "file_foot",
            State::NextFile => "next_file",
            State::BodyFoot => "body_foot",
            State::BodyEnd => "body_end",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resumable encoder position: the state plus the current file index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    pub state: State,
    pub file_idx: usize,
}

impl Cursor {
    /// Position before anything has been emitted
    pub const START: Cursor = Cursor {
        state: State::FormFields,
        file_idx: 0,
    };

    /// Same file, new state
    pub(crate) fn to(self, state: State) -> Cursor {
        Cursor { state, ..self }
    }

    /// Whether the whole document has been emitted
    pub fn is_finished(&self) -> bool {
        self.state == State::BodyEnd
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Cursor::START
    }
}
