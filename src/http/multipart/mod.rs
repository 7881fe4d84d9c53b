//! Lazy multipart/form-data encoder
//!
//! A [`Multipart`] document owns its form fields and file fields and emits
//! the encoded body one state transition at a time. Files backed by readers
//! are streamed in pieces of at most `chunk_size` bytes, so the whole body is
//! never held in memory.
//!
//! Wire layout, with boundary `B`:
//!
//! ```text
//! --B\r\nContent-Disposition: form-data; name="a"\r\n\r\n1\r\n--B\r\n ... \r\n\r\n2
//! --B\r\nContent-Disposition: form-data; name="f"; filename="x.csv"\r\nContent-Type: text/csv\r\n\r\n
//! <file content>\r\n
//! --B--\r\n
//! ```
//!
//! The field batch is emitted in one piece, the closing boundary follows it
//! directly.
//!
//! # Examples
//!
//! ```
//! use mmrest::http::{FileField, FormField, Multipart};
//!
//! let mut doc = Multipart::new(
//!     vec![FormField::new("pid", "abc")],
//!     vec![FileField::new("object", "o.txt", "hello")],
//! )
//! .with_boundary("B");
//!
//! let len = doc.content_length().unwrap();
//! let body = doc.read_all().unwrap();
//! assert_eq!(body.len() as u64, len);
//! assert!(body.ends_with(b"--B--\r\n"));
//! ```

mod length;
mod source;
mod state;

pub use source::{ByteSource, FileField, FormField, ReadSeek};
pub use state::{Cursor, State};

use super::{Error, Result, CRLF};
use bytes::{Bytes, BytesMut};
use std::io;

/// Boundary used when none is given
pub const DEFAULT_BOUNDARY: &str = "----------6B3C785C-6290-11DF-A355-A6ECDED72085_$";

/// Largest piece read from a file source per transition
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Upper bound for [`Multipart::with_chunk_size`]
pub const MAX_CHUNK_SIZE: usize = 64 * 1024 * 1024;

/// Bytes requested from a reader per call while filling a chunk
const READ_BLOCK: usize = 16 * 1024;

/// Content type for files whose extension maps to nothing
pub const OCTET_STREAM: &str = "application/octet-stream";

/// A multipart/form-data document and its encoding cursor
///
/// The document is single-pass: once exhausted it yields nothing until
/// [`reset`](Multipart::reset) rewinds the cursor and every seekable source.
/// Sources are never closed by the document.
#[derive(Debug)]
pub struct Multipart<'a> {
    fields: Vec<FormField>,
    files: Vec<FileField<'a>>,
    boundary: String,
    chunk_size: usize,
    cursor: Cursor,
    buffer: BytesMut,
}

impl<'a> Multipart<'a> {
    /// Create a document with the default boundary and chunk size
    pub fn new(fields: Vec<FormField>, files: Vec<FileField<'a>>) -> Self {
        Multipart {
            fields,
            files,
            boundary: DEFAULT_BOUNDARY.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            cursor: Cursor::START,
            buffer: BytesMut::new(),
        }
    }

    /// Use a different boundary token
    ///
    /// The token is not checked against field or file content.
    pub fn with_boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = boundary.into();
        self
    }

    /// Use a different chunk size, clamped to `1..=MAX_CHUNK_SIZE`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
        self
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn files(&self) -> &[FileField<'a>] {
        &self.files
    }

    /// Value for the request's `Content-Type` header
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Current encoder position
    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Emit the bytes of the next state transition
    ///
    /// Returns `Ok(None)` once the document is exhausted. Some transitions
    /// emit an empty chunk. A failed transition ends the pass.
    pub fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.cursor.is_finished() {
            return Ok(None);
        }

        match self.transition(self.cursor) {
            Ok((chunk, next)) => {
                tracing::trace!(
                    from = %self.cursor.state,
                    to = %next.state,
                    file_idx = self.cursor.file_idx,
                    len = chunk.len(),
                    "multipart transition"
                );
                self.cursor = next;
                Ok(Some(chunk))
            }
            Err(e) => {
                self.cursor = self.cursor.to(State::BodyEnd);
                Err(e)
            }
        }
    }

    /// Read at least `n` bytes unless the document ends first
    ///
    /// Exactly `n` bytes are returned except for the final piece; surplus
    /// from the last chunk is kept for the next call. An empty result means
    /// the document is exhausted.
    pub fn read_bytes(&mut self, n: usize) -> Result<Bytes> {
        while self.buffer.len() < n {
            match self.next_chunk()? {
                Some(chunk) => self.buffer.extend_from_slice(&chunk),
                None => break,
            }
        }
        let take = n.min(self.buffer.len());
        Ok(self.buffer.split_to(take).freeze())
    }

    /// Drain the rest of the document
    pub fn read_all(&mut self) -> Result<Bytes> {
        while let Some(chunk) = self.next_chunk()? {
            self.buffer.extend_from_slice(&chunk);
        }
        Ok(self.buffer.split().freeze())
    }

    /// Rewind to the start so the same bytes are produced again
    ///
    /// Seekable sources go back to the position they had when they were
    /// wrapped. Forward-only sources are left alone and must not be replayed.
    pub fn reset(&mut self) -> Result<()> {
        self.cursor = Cursor::START;
        self.buffer.clear();
        for file in &mut self.files {
            file.source.rewind().map_err(Error::Source)?;
        }
        Ok(())
    }

    /// Compute the bytes and successor for `cursor`
    fn transition(&mut self, cursor: Cursor) -> Result<(Bytes, Cursor)> {
        let has_files = !self.files.is_empty();

        match cursor.state {
            State::FormFields => {
                let next = if has_files { State::FileHead } else { State::BodyFoot };
                Ok((self.form_fields(), cursor.to(next)))
            }
            State::FileHead => {
                let head = self.file_head(cursor.file_idx)?;
                Ok((head, cursor.to(State::Select)))
            }
            State::Select => {
                let next = match &self.file(cursor.file_idx)?.source {
                    ByteSource::Bytes(_) => State::RawValue,
                    ByteSource::Text(_) => State::TextValue,
                    ByteSource::Seekable { .. } | ByteSource::Stream(_) => State::FileChunk,
                };
                Ok((Bytes::new(), cursor.to(next)))
            }
            State::RawValue => match &self.file(cursor.file_idx)?.source {
                ByteSource::Bytes(b) => Ok((b.clone(), cursor.to(State::FileFoot))),
                other => Err(mismatch(cursor, other)),
            },
            State::TextValue => match &self.file(cursor.file_idx)?.source {
                ByteSource::Text(s) => Ok((
                    Bytes::copy_from_slice(s.as_bytes()),
                    cursor.to(State::FileFoot),
                )),
                other => Err(mismatch(cursor, other)),
            },
            State::FileChunk => {
                let data = self.file_chunk(cursor)?;
                if data.is_empty() {
                    Ok((data, cursor.to(State::FileFoot)))
                } else {
                    Ok((data, cursor))
                }
            }
            State::FileFoot => Ok((Bytes::from_static(CRLF.as_bytes()), cursor.to(State::NextFile))),
            State::NextFile => {
                let file_idx = cursor.file_idx + 1;
                let state = if file_idx < self.files.len() {
                    State::FileHead
                } else {
                    State::BodyFoot
                };
                Ok((Bytes::new(), Cursor { state, file_idx }))
            }
            State::BodyFoot => {
                let foot = format!("--{}--{}", self.boundary, CRLF);
                Ok((Bytes::from(foot), cursor.to(State::BodyEnd)))
            }
            State::BodyEnd => Err(Error::InvalidState(
                "transition requested past the end of the document".to_string(),
            )),
        }
    }

    fn file(&self, idx: usize) -> Result<&FileField<'a>> {
        self.files.get(idx).ok_or_else(|| {
            Error::InvalidState(format!(
                "file index {} out of range ({} files)",
                idx,
                self.files.len()
            ))
        })
    }

    fn form_fields(&self) -> Bytes {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|field| {
                format!(
                    "--{b}{crlf}Content-Disposition: form-data; name=\"{name}\"{crlf}{crlf}{value}",
                    b = self.boundary,
                    crlf = CRLF,
                    name = field.name,
                    value = field.value,
                )
            })
            .collect();
        Bytes::from(parts.join(CRLF))
    }

    fn file_head(&self, idx: usize) -> Result<Bytes> {
        let file = self.file(idx)?;
        let head = format!(
            "--{b}{crlf}Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"{crlf}Content-Type: {ctype}{crlf}{crlf}",
            b = self.boundary,
            crlf = CRLF,
            name = file.name,
            filename = file.filename,
            ctype = guess_mime_type(&file.filename),
        );
        Ok(Bytes::from(head))
    }

    /// Read up to `chunk_size` bytes from the current reader
    ///
    /// Short reads are retried until the chunk is full or the reader ends.
    /// The chunk grows with the data read, so a large chunk size over a
    /// small reader costs no more than the reader holds.
    fn file_chunk(&mut self, cursor: Cursor) -> Result<Bytes> {
        let chunk_size = self.chunk_size;
        let len = self.files.len();
        let file = self.files.get_mut(cursor.file_idx).ok_or_else(|| {
            Error::InvalidState(format!(
                "file index {} out of range ({} files)",
                cursor.file_idx, len
            ))
        })?;

        let mut chunk = BytesMut::new();
        let mut block = [0u8; READ_BLOCK];
        while chunk.len() < chunk_size {
            let want = (chunk_size - chunk.len()).min(READ_BLOCK);
            match file.source.read(&mut block[..want]) {
                Some(Ok(0)) => break,
                Some(Ok(n)) => chunk.extend_from_slice(&block[..n]),
                Some(Err(e)) if e.kind() == io::ErrorKind::Interrupted => continue,
                Some(Err(e)) => return Err(Error::Source(e)),
                None => return Err(mismatch(cursor, &file.source)),
            }
        }
        Ok(chunk.freeze())
    }
}

impl Iterator for Multipart<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

/// Guess a content type from the file name's extension
pub fn guess_mime_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| OCTET_STREAM.to_string())
}

fn mismatch(cursor: Cursor, source: &ByteSource<'_>) -> Error {
    Error::InvalidState(format!(
        "state {} does not match source {:?} of file {}",
        cursor.state, source, cursor.file_idx
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor as IoCursor;

    fn collect(doc: &mut Multipart<'_>) -> Vec<(State, Bytes)> {
        let mut out = Vec::new();
        loop {
            let state = doc.cursor().state;
            match doc.next_chunk().unwrap() {
                Some(chunk) => out.push((state, chunk)),
                None => return out,
            }
        }
    }

    #[test]
    fn test_fields_only() {
        let mut doc = Multipart::new(
            vec![FormField::new("a", "1"), FormField::new("b", "2")],
            vec![],
        )
        .with_boundary("B");

        let body = doc.read_all().unwrap();
        assert_eq!(
            &body[..],
            &b"--B\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\n1\r\n\
               --B\r\nContent-Disposition: form-data; name=\"b\"\r\n\r\n2--B--\r\n"[..]
        );
        assert!(doc.cursor().is_finished());
        assert!(doc.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_empty_document() {
        let mut doc = Multipart::new(vec![], vec![]).with_boundary("B");
        assert_eq!(&doc.read_all().unwrap()[..], b"--B--\r\n");
    }

    #[test]
    fn test_state_sequence_for_text_file() {
        let mut doc = Multipart::new(vec![], vec![FileField::new("f", "a.txt", "hi")])
            .with_boundary("B");
        let states: Vec<State> = collect(&mut doc).into_iter().map(|(s, _)| s).collect();
        assert_eq!(
            states,
            vec![
                State::FormFields,
                State::FileHead,
                State::Select,
                State::TextValue,
                State::FileFoot,
                State::NextFile,
                State::BodyFoot,
            ]
        );
    }

    #[test]
    fn test_file_head_and_foot() {
        let mut doc = Multipart::new(
            vec![],
            vec![FileField::new("object", "data.csv", vec![b'x'; 3])],
        )
        .with_boundary("B");

        let body = doc.read_all().unwrap();
        assert_eq!(
            &body[..],
            &b"--B\r\nContent-Disposition: form-data; name=\"object\"; filename=\"data.csv\"\r\n\
               Content-Type: text/csv\r\n\r\nxxx\r\n--B--\r\n"[..]
        );
    }

    #[test]
    fn test_reader_chunks() {
        let data: Vec<u8> = (0..25u8).collect();
        let source = ByteSource::seekable(IoCursor::new(data.clone())).unwrap();
        let mut doc = Multipart::new(vec![], vec![FileField::new("f", "f.bin", source)])
            .with_chunk_size(10);

        let chunks: Vec<Bytes> = collect(&mut doc)
            .into_iter()
            .filter(|(s, c)| *s == State::FileChunk && !c.is_empty())
            .map(|(_, c)| c)
            .collect();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(|c| c.len()).collect::<Vec<_>>(), vec![10, 10, 5]);
        assert_eq!(chunks.concat(), data);
    }

    #[test]
    fn test_unknown_extension_is_octet_stream() {
        assert_eq!(guess_mime_type("blob.zzqx"), OCTET_STREAM);
        assert_eq!(guess_mime_type("noext"), OCTET_STREAM);
        assert_eq!(guess_mime_type("page.html"), "text/html");
    }

    #[test]
    fn test_read_bytes_keeps_surplus() {
        let mut doc = Multipart::new(vec![FormField::new("a", "1")], vec![]).with_boundary("B");
        let all = Multipart::new(vec![FormField::new("a", "1")], vec![])
            .with_boundary("B")
            .read_all()
            .unwrap();

        let first = doc.read_bytes(5).unwrap();
        assert_eq!(&first[..], &all[..5]);
        let rest = doc.read_bytes(10_000).unwrap();
        assert_eq!(&rest[..], &all[5..]);
        assert!(doc.read_bytes(1).unwrap().is_empty());
    }

    #[test]
    fn test_reset_replays() {
        let source = ByteSource::seekable(IoCursor::new(b"abcdef".to_vec())).unwrap();
        let mut doc = Multipart::new(
            vec![FormField::new("k", "v")],
            vec![FileField::new("f", "f.txt", source)],
        )
        .with_chunk_size(4);

        let first = doc.read_all().unwrap();
        doc.reset().unwrap();
        let second = doc.read_all().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_mismatched_state_is_fatal() {
        let mut doc = Multipart::new(vec![], vec![FileField::new("f", "f.txt", "text")]);
        doc.cursor = Cursor {
            state: State::RawValue,
            file_idx: 0,
        };
        assert!(matches!(doc.next_chunk(), Err(Error::InvalidState(_))));
        // The pass is over after a fault
        assert!(doc.next_chunk().unwrap().is_none());
    }

    #[test]
    fn test_out_of_range_file_is_fatal() {
        let mut doc = Multipart::new(vec![], vec![]);
        doc.cursor = Cursor {
            state: State::FileHead,
            file_idx: 3,
        };
        assert!(matches!(doc.next_chunk(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_iterator_yields_empty_transitions() {
        let doc = Multipart::new(vec![], vec![FileField::new("f", "a.bin", vec![1u8])]);
        let chunks: Vec<Bytes> = doc.map(|c| c.unwrap()).collect();
        assert!(chunks.iter().any(|c| c.is_empty()));
        assert_eq!(chunks.len(), 7);
    }

    #[test]
    fn test_content_type() {
        let doc = Multipart::new(vec![], vec![]).with_boundary("xyz");
        assert_eq!(doc.content_type(), "multipart/form-data; boundary=xyz");
    }

    #[test]
    fn test_huge_chunk_size_over_small_reader() {
        let source = ByteSource::seekable(IoCursor::new(vec![1u8; 3])).unwrap();
        let mut doc = Multipart::new(vec![], vec![FileField::new("f", "f.bin", source)])
            .with_boundary("B")
            .with_chunk_size(usize::MAX / 2);
        assert_eq!(doc.chunk_size(), MAX_CHUNK_SIZE);

        let chunks = collect(&mut doc);
        let data: Vec<&Bytes> = chunks
            .iter()
            .filter(|(state, _)| *state == State::FileChunk)
            .map(|(_, chunk)| chunk)
            .collect();
        assert_eq!(data.len(), 2);
        assert_eq!(&data[0][..], &[1u8, 1, 1][..]);
        assert!(data[1].is_empty());
    }

    struct FailingReader;

    impl io::Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "disk says no"))
        }
    }

    #[test]
    fn test_source_read_error_is_not_transport() {
        let mut doc = Multipart::new(
            vec![],
            vec![FileField::new("f", "f.bin", ByteSource::stream(FailingReader))],
        );
        let err = doc.read_all().unwrap_err();
        assert!(matches!(err, Error::Source(_)));
        assert!(!err.is_transport());
    }
}
