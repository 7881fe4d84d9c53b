//! mmrest - streaming multipart/form-data encoder and REST client
//!
//! This crate provides a lazy `multipart/form-data` encoder that never holds
//! whole files in memory, and a blocking HTTP/1.1 REST client that drives it
//! over plain TCP or TLS connections.

pub mod http;
pub mod net;
