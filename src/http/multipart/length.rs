//! Exact body length ahead of transmission

use super::{ByteSource, FileField, Multipart};
use crate::http::{Error, Result};

impl Multipart<'_> {
    /// Total number of bytes a full pass will emit
    ///
    /// Boundaries, part headers and footers are measured by encoding a copy
    /// of the document whose files are empty; the size of every real source
    /// is added on top. Every source must report its size, so a forward-only
    /// reader fails with [`Error::UnseekableSource`] before anything is read.
    /// The document is reset afterwards.
    pub fn content_length(&mut self) -> Result<u64> {
        if let Some(file) = self.files.iter().find(|f| !f.source.is_seekable()) {
            return Err(Error::UnseekableSource {
                name: file.name.clone(),
                filename: file.filename.clone(),
            });
        }

        let mut payload = 0u64;
        for file in &mut self.files {
            match file.source.byte_len() {
                Some(len) => payload += len.map_err(Error::Source)?,
                None => {
                    return Err(Error::UnseekableSource {
                        name: file.name.clone(),
                        filename: file.filename.clone(),
                    })
                }
            }
        }

        let placeholders = self
            .files
            .iter()
            .map(|f| FileField {
                name: f.name.clone(),
                filename: f.filename.clone(),
                source: ByteSource::placeholder(),
            })
            .collect();
        let mut skeleton = Multipart::new(self.fields.clone(), placeholders)
            .with_boundary(self.boundary.clone());

        let mut overhead = 0u64;
        while let Some(chunk) = skeleton.next_chunk()? {
            overhead += chunk.len() as u64;
        }

        self.reset()?;
        tracing::trace!(overhead, payload, "multipart content length");
        Ok(overhead + payload)
    }
}
