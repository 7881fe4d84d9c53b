//! Chunked transfer decoding
//!
//! Response bodies framed with `Transfer-Encoding: chunked` are decoded
//! incrementally as they are read from the connection.

use super::parser::find_crlf;
use super::{Error, Result};

/// Chunked decoder
///
/// Decodes HTTP chunked transfer encoding format
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: DecoderState,
    chunk_size: usize,
    chunk_read: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DecoderState {
    ChunkSize,
    ChunkData,
    ChunkEnd,
    Trailer,
    Complete,
}

impl ChunkedDecoder {
    /// Create a new chunked decoder
    pub fn new() -> Self {
        ChunkedDecoder {
            state: DecoderState::ChunkSize,
            chunk_size: 0,
            chunk_read: 0,
        }
    }

    /// Decode from the input buffer into `output`
    ///
    /// Returns (bytes_consumed, bytes_decoded, is_complete)
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> Result<(usize, usize, bool)> {
        let mut input_pos = 0;
        let mut output_pos = 0;

        while input_pos < input.len() && output_pos < output.len() {
            match self.state {
                DecoderState::ChunkSize => {
                    let Some(crlf_pos) = find_crlf(&input[input_pos..]) else {
                        break;
                    };
                    let line = String::from_utf8_lossy(&input[input_pos..input_pos + crlf_pos]);

                    // Chunk extensions after ';' are ignored
                    let size_str = line.split(';').next().unwrap_or("").trim();
                    self.chunk_size = usize::from_str_radix(size_str, 16)
                        .map_err(|_| Error::InvalidChunkSize(size_str.to_string()))?;

                    input_pos += crlf_pos + 2;
                    self.chunk_read = 0;
                    self.state = if self.chunk_size == 0 {
                        DecoderState::Trailer
                    } else {
                        DecoderState::ChunkData
                    };
                }

                DecoderState::ChunkData => {
                    let remaining_in_chunk = self.chunk_size - self.chunk_read;
                    let available_input = input.len() - input_pos;
                    let available_output = output.len() - output_pos;

                    let to_copy = remaining_in_chunk.min(available_input).min(available_output);

                    output[output_pos..output_pos + to_copy]
                        .copy_from_slice(&input[input_pos..input_pos + to_copy]);

                    input_pos += to_copy;
                    output_pos += to_copy;
                    self.chunk_read += to_copy;

                    if self.chunk_read == self.chunk_size {
                        self.state = DecoderState::ChunkEnd;
                    } else {
                        break;
                    }
                }

                DecoderState::ChunkEnd => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] != b"\r\n" {
                        return Err(Error::Protocol("Expected CRLF after chunk".to_string()));
                    }
                    input_pos += 2;
                    self.state = DecoderState::ChunkSize;
                }

                DecoderState::Trailer => {
                    if input.len() - input_pos < 2 {
                        break;
                    }
                    if &input[input_pos..input_pos + 2] == b"\r\n" {
                        input_pos += 2;
                        self.state = DecoderState::Complete;
                        return Ok((input_pos, output_pos, true));
                    }
                    // Trailer header lines are skipped
                    match find_crlf(&input[input_pos..]) {
                        Some(crlf_pos) => input_pos += crlf_pos + 2,
                        None => break,
                    }
                }

                DecoderState::Complete => {
                    return Ok((input_pos, output_pos, true));
                }
            }
        }

        Ok((input_pos, output_pos, self.state == DecoderState::Complete))
    }

    /// Check if decoding is complete
    pub fn is_complete(&self) -> bool {
        self.state == DecoderState::Complete
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode a complete chunked body held in memory
    fn decode_chunked_body(input: &[u8]) -> Result<Vec<u8>> {
        let mut decoder = ChunkedDecoder::new();
        let mut output = Vec::new();
        let mut input_pos = 0;

        while input_pos < input.len() {
            let mut temp = vec![0u8; 8192];
            let (consumed, decoded, complete) = decoder.decode(&input[input_pos..], &mut temp)?;

            output.extend_from_slice(&temp[..decoded]);
            input_pos += consumed;

            if complete || (consumed == 0 && decoded == 0) {
                break;
            }
        }

        if !decoder.is_complete() {
            return Err(Error::Incomplete);
        }

        Ok(output)
    }

    #[test]
    fn test_decode_single_chunk() {
        let output = decode_chunked_body(b"5\r\nHello\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_multiple_chunks() {
        let output = decode_chunked_body(b"5\r\nHello\r\n5\r\nWorld\r\n0\r\n\r\n").unwrap();
        assert_eq!(output, b"HelloWorld");
    }

    #[test]
    fn test_decode_with_extension_and_trailer() {
        let input = b"5;name=value\r\nHello\r\n0\r\nX-Checksum: abc\r\n\r\n";
        let output = decode_chunked_body(input).unwrap();
        assert_eq!(output, b"Hello");
    }

    #[test]
    fn test_decode_incomplete() {
        assert!(matches!(
            decode_chunked_body(b"5\r\nHel"),
            Err(Error::Incomplete)
        ));
    }

    #[test]
    fn test_decode_bad_size() {
        assert!(matches!(
            decode_chunked_body(b"zz\r\nHello\r\n0\r\n\r\n"),
            Err(Error::InvalidChunkSize(_))
        ));
    }

    #[test]
    fn test_decoder_small_output_buffer() {
        let input = b"a\r\n0123456789\r\n0\r\n\r\n";
        let mut decoder = ChunkedDecoder::new();
        let mut pos = 0;
        let mut out = Vec::new();

        while !decoder.is_complete() {
            let mut buf = [0u8; 3];
            let (consumed, decoded, _) = decoder.decode(&input[pos..], &mut buf).unwrap();
            pos += consumed;
            out.extend_from_slice(&buf[..decoded]);
        }

        assert_eq!(out, b"0123456789");
        assert_eq!(pos, input.len());
    }
}
