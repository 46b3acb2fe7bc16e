//! Core traits for byte-stream codecs.

use crate::entry::CompressionMethod;
use crate::error::Result;
use crate::format::FormatTag;

/// A one-shot byte-stream codec.
///
/// Implementations produce and consume the payload that follows the
/// codec's magic tag; the tag itself is written by the caller.
pub trait Codec {
    /// Tag that marks this codec's blobs.
    const TAG: FormatTag;

    /// Method byte recorded in archive entries.
    const METHOD: CompressionMethod;

    /// Compress `data` into a tagless payload.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a tagless payload.
    fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Compress and prefix the result with [`Self::TAG`].
    fn compress_tagged(&self, data: &[u8]) -> Result<Vec<u8>> {
        let payload = self.compress(data)?;
        Ok(Self::TAG.wrap(&payload))
    }
}

/// The identity codec used for incompressible entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredCodec;

impl Codec for StoredCodec {
    const TAG: FormatTag = FormatTag::Stored;
    const METHOD: CompressionMethod = CompressionMethod::Stored;

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(payload.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_codec_tagged() {
        let blob = StoredCodec.compress_tagged(b"plain").unwrap();
        assert_eq!(&blob[..4], b"TCS1");
        assert_eq!(StoredCodec.decompress(&blob[4..]).unwrap(), b"plain");
    }
}
