//! RFC3986 URL element encoding
//!
//! Path elements and query elements have different safe character sets:
//! a query may carry `/`, `;` and `?` unescaped, a path element may not.
//! Both sets always include the unreserved characters `A-Z a-z 0-9 - _ . ~`.

use super::{Error, Result};
use percent_encoding::{
    percent_decode_str, percent_encode, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC,
};

/// Characters left unescaped in a path element: `:@$!()',~*&=`
const PATH_ELEMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b'@')
    .remove(b'$')
    .remove(b'!')
    .remove(b'(')
    .remove(b')')
    .remove(b'\'')
    .remove(b',')
    .remove(b'~')
    .remove(b'*')
    .remove(b'&')
    .remove(b'=');

/// Characters left unescaped in a query element: `:;@$!()',~*/?`
const QUERY_ELEMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b';')
    .remove(b'@')
    .remove(b'$')
    .remove(b'!')
    .remove(b'(')
    .remove(b')')
    .remove(b'\'')
    .remove(b',')
    .remove(b'~')
    .remove(b'*')
    .remove(b'/')
    .remove(b'?');

/// Percent-encode a URL path element after encoding it as UTF-8
pub fn encode_path_element(element: &str) -> String {
    utf8_percent_encode(element, PATH_ELEMENT).to_string()
}

/// Decode a percent-encoded URL path element
///
/// Malformed escapes are passed through as-is. Fails when the decoded bytes
/// are not valid UTF-8.
pub fn decode_path_element(element: &str) -> Result<String> {
    percent_decode_str(element)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|e| Error::InvalidEncoding(format!("{}: {}", element, e)))
}

/// Percent-encode a URL query element after encoding it as UTF-8
pub fn encode_query_element(element: &str) -> String {
    utf8_percent_encode(element, QUERY_ELEMENT).to_string()
}

/// Percent-encode raw bytes as a URL query element
pub fn encode_query_bytes(element: &[u8]) -> String {
    percent_encode(element, QUERY_ELEMENT).to_string()
}
