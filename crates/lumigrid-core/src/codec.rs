//! Frame payload codec for status documents.
//!
//! Status snapshots can carry the most recent frame so UI processes can
//! render a live preview without megabytes of raw RGB triples in JSON. The
//! encoding is: pixel list -> compact JSON -> zlib -> base64.
//!
//! Decoding is deliberately forgiving: a bad payload must never crash a UI,
//! so malformed input decodes to an empty list.

use crate::layout::{Frame, Rgb};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use tracing::debug;

/// Identifier recorded alongside encoded payloads so readers can tell what
/// produced them.
pub const FRAME_ENCODING_NAME: &str = "json-zlib-base64";

/// Compress a frame into a base64 string. Empty frames encode to `""`.
pub fn encode_frame(frame: &[Rgb]) -> String {
    if frame.is_empty() {
        return String::new();
    }

    // serde_json can only fail on non-string map keys or a failing writer;
    // neither applies to a Vec<Rgb> written into memory.
    let packed = serde_json::to_vec(frame).unwrap_or_default();
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(&packed).is_err() {
        return String::new();
    }
    match encoder.finish() {
        Ok(compressed) => BASE64.encode(compressed),
        Err(_) => String::new(),
    }
}

/// Decode a payload produced by [`encode_frame`].
///
/// Returns an empty frame for empty or malformed input rather than failing.
pub fn decode_frame(encoded: &str) -> Frame {
    if encoded.is_empty() {
        return Vec::new();
    }

    let compressed = match BASE64.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!("Discarding frame payload with bad base64: {}", err);
            return Vec::new();
        }
    };

    let mut packed = Vec::new();
    if let Err(err) = ZlibDecoder::new(&compressed[..]).read_to_end(&mut packed) {
        debug!("Discarding frame payload with bad zlib stream: {}", err);
        return Vec::new();
    }

    match serde_json::from_slice(&packed) {
        Ok(frame) => frame,
        Err(err) => {
            debug!("Discarding frame payload with bad pixel JSON: {}", err);
            Vec::new()
        }
    }
}
