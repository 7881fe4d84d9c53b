//! Form fields, file fields and their byte sources

use bytes::Bytes;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};

/// A reader that can also seek, used for file-backed sources
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// Where a file part's content comes from
///
/// The variant decides how the part is emitted: in-memory values go out in
/// one piece, readers are streamed in `chunk_size` pieces. Readers are only
/// borrowed for the lifetime `'a` and are never closed by the encoder.
pub enum ByteSource<'a> {
    /// Raw bytes held in memory
    Bytes(Bytes),
    /// Text held in memory, emitted as UTF-8
    Text(String),
    /// A seekable reader; `origin` is where every pass starts
    Seekable {
        reader: Box<dyn ReadSeek + 'a>,
        origin: u64,
    },
    /// A forward-only reader; it can be emitted once and has no known size
    Stream(Box<dyn Read + 'a>),
}

impl<'a> ByteSource<'a> {
    /// Wrap a seekable reader, remembering its current position as the origin
    pub fn seekable<R: Read + Seek + 'a>(mut reader: R) -> io::Result<Self> {
        let origin = reader.stream_position()?;
        Ok(ByteSource::Seekable {
            reader: Box::new(reader),
            origin,
        })
    }

    /// Wrap a forward-only reader
    pub fn stream<R: Read + 'a>(reader: R) -> Self {
        ByteSource::Stream(Box::new(reader))
    }

    /// Whether the source supports seek/tell
    pub fn is_seekable(&self) -> bool {
        !matches!(self, ByteSource::Stream(_))
    }

    /// Number of bytes one pass will emit, or None for a forward-only reader
    ///
    /// Seekable readers are measured by seeking to the end and back.
    pub fn byte_len(&mut self) -> Option<io::Result<u64>> {
        match self {
            ByteSource::Bytes(b) => Some(Ok(b.len() as u64)),
            ByteSource::Text(s) => Some(Ok(s.len() as u64)),
            ByteSource::Seekable { reader, origin } => Some(remaining_from(reader.as_mut(), *origin)),
            ByteSource::Stream(_) => None,
        }
    }

    /// Seek back to the origin; sources without seek support are skipped
    pub(crate) fn rewind(&mut self) -> io::Result<()> {
        if let ByteSource::Seekable { reader, origin } = self {
            reader.seek(SeekFrom::Start(*origin))?;
        }
        Ok(())
    }

    /// Read into `buf` from a reader-backed source
    ///
    /// Returns None for in-memory sources.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> Option<io::Result<usize>> {
        match self {
            ByteSource::Seekable { reader, .. } => Some(reader.read(buf)),
            ByteSource::Stream(reader) => Some(reader.read(buf)),
            ByteSource::Bytes(_) | ByteSource::Text(_) => None,
        }
    }

    /// An empty in-memory source of the same emission kind
    pub(crate) fn placeholder() -> ByteSource<'static> {
        ByteSource::Bytes(Bytes::new())
    }
}

fn remaining_from(reader: &mut dyn ReadSeek, origin: u64) -> io::Result<u64> {
    let pos = reader.stream_position()?;
    let end = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(pos))?;
    Ok(end.saturating_sub(origin))
}

impl fmt::Debug for ByteSource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ByteSource::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            ByteSource::Seekable { origin, .. } => {
                f.debug_struct("Seekable").field("origin", origin).finish()
            }
            ByteSource::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl From<&str> for ByteSource<'_> {
    fn from(s: &str) -> Self {
        ByteSource::Text(s.to_string())
    }
}

impl From<String> for ByteSource<'_> {
    fn from(s: String) -> Self {
        ByteSource::Text(s)
    }
}

impl From<Vec<u8>> for ByteSource<'_> {
    fn from(b: Vec<u8>) -> Self {
        ByteSource::Bytes(Bytes::from(b))
    }
}

impl From<&[u8]> for ByteSource<'_> {
    fn from(b: &[u8]) -> Self {
        ByteSource::Bytes(Bytes::copy_from_slice(b))
    }
}

impl From<Bytes> for ByteSource<'_> {
    fn from(b: Bytes) -> Self {
        ByteSource::Bytes(b)
    }
}

/// A plain form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

impl FormField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormField {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for FormField {
    fn from((name, value): (N, V)) -> Self {
        FormField::new(name, value)
    }
}

/// A file upload field
#[derive(Debug)]
pub struct FileField<'a> {
    pub name: String,
    pub filename: String,
    pub source: ByteSource<'a>,
}

impl<'a> FileField<'a> {
    pub fn new(
        name: impl Into<String>,
        filename: impl Into<String>,
        source: impl Into<ByteSource<'a>>,
    ) -> Self {
        FileField {
            name: name.into(),
            filename: filename.into(),
            source: source.into(),
        }
    }
}
