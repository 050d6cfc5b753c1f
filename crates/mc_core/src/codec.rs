use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::{Error, Result};

/// Turns a decoded page body into the opaque blob kept in `raw_content`.
pub trait ContentCodec: Send + Sync {
    fn encode(&self, html: &str) -> Result<Vec<u8>>;

    fn decode(&self, blob: &[u8]) -> Result<String>;
}

#[derive(Debug, Clone, Copy)]
pub struct ZlibCodec {
    level: Compression,
}

impl ZlibCodec {
    pub fn new() -> Self {
        Self {
            level: Compression::best(),
        }
    }
}

impl Default for ZlibCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCodec for ZlibCodec {
    fn encode(&self, html: &str) -> Result<Vec<u8>> {
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder
            .write_all(html.as_bytes())
            .map_err(|e| Error::Codec(format!("Failed to compress content: {}", e)))?;
        encoder
            .finish()
            .map_err(|e| Error::Codec(format!("Failed to compress content: {}", e)))
    }

    fn decode(&self, blob: &[u8]) -> Result<String> {
        let mut html = String::new();
        ZlibDecoder::new(blob)
            .read_to_string(&mut html)
            .map_err(|e| Error::Codec(format!("Failed to decompress content: {}", e)))?;
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_restores_original_page() {
        let codec = ZlibCodec::new();
        let html = "<html><body><p>São Paulo às 22h14</p></body></html>".repeat(20);
        let blob = codec.encode(&html).unwrap();
        assert!(blob.len() < html.len());
        assert_eq!(codec.decode(&blob).unwrap(), html);
    }

    #[test]
    fn test_garbage_is_a_codec_error() {
        let codec = ZlibCodec::new();
        assert!(matches!(codec.decode(b"not zlib"), Err(Error::Codec(_))));
    }
}
