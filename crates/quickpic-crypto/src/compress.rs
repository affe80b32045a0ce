//! Raw DEFLATE (RFC 1951): no zlib header, no gzip framing.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

use crate::error::{CryptoError, Result};

pub fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(CryptoError::Compression)?;
    encoder.finish().map_err(CryptoError::Compression)
}

pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    DeflateDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|_| CryptoError::Format("content is not a raw deflate stream"))?;
    Ok(out)
}
