//! Binary encoding of tile samples.
//!
//! # Layout
//!
//! - [`SerializeFormat::Raw`]: `TILE_SAMPLES` big-endian IEEE-754 doubles
//!   in row-major order (`y * TILE_WIDTH + x`).
//! - [`SerializeFormat::Compressed`]: a 4-byte big-endian length of the raw
//!   buffer, followed by the raw buffer as a zlib stream.
//!
//! Decoding reads exactly `TILE_SAMPLES` values; trailing bytes are ignored.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::{debug, warn};

use crate::error::TileError;

use super::TILE_SAMPLES;

/// Size of the length prefix in front of a compressed stream.
const COMPRESSED_HEADER_SIZE: usize = 4;

/// Upper bound accepted for the declared uncompressed length.
const MAX_UNCOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// How a tile's samples are turned into bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializeFormat {
    #[default]
    Raw,
    Compressed,
}

/// Encode samples in the given format.
pub fn serialize(data: &[f64], format: SerializeFormat) -> Bytes {
    let mut raw = BytesMut::with_capacity(data.len() * 8);
    for value in data {
        raw.put_f64(*value);
    }

    match format {
        SerializeFormat::Raw => raw.freeze(),
        SerializeFormat::Compressed => compress(&raw),
    }
}

/// Decode samples, returning an empty vector when the stream is short or
/// corrupt.
pub fn deserialize(input: &[u8], format: SerializeFormat) -> Vec<f64> {
    match try_deserialize(input, format) {
        Ok(values) => values,
        Err(e) => {
            debug!("Discarding undecodable tile stream: {}", e);
            Vec::new()
        }
    }
}

/// Decode samples, reporting why a stream could not be read.
pub fn try_deserialize(input: &[u8], format: SerializeFormat) -> Result<Vec<f64>, TileError> {
    match format {
        SerializeFormat::Raw => read_samples(input),
        SerializeFormat::Compressed => {
            let raw = decompress(input)?;
            read_samples(&raw)
        }
    }
}

fn read_samples(mut input: &[u8]) -> Result<Vec<f64>, TileError> {
    let required = TILE_SAMPLES * 8;
    if input.len() < required {
        return Err(TileError::CorruptData(format!(
            "need {} bytes for {} samples, got {}",
            required,
            TILE_SAMPLES,
            input.len()
        )));
    }

    let mut values = Vec::with_capacity(TILE_SAMPLES);
    for _ in 0..TILE_SAMPLES {
        values.push(input.get_f64());
    }
    Ok(values)
}

fn compress(raw: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(COMPRESSED_HEADER_SIZE + raw.len() / 2);
    out.put_u32(raw.len() as u32);

    match zlib_into(raw, out.writer()) {
        Ok(writer) => writer.into_inner().freeze(),
        Err(e) => {
            warn!(bytes = raw.len(), "Tile compression failed: {}", e);
            Bytes::new()
        }
    }
}

/// Deflate `raw` into `writer` and hand the writer back.
fn zlib_into<W: Write>(raw: &[u8], writer: W) -> std::io::Result<W> {
    let mut encoder = ZlibEncoder::new(writer, Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

fn decompress(input: &[u8]) -> Result<Vec<u8>, TileError> {
    if input.len() < COMPRESSED_HEADER_SIZE {
        return Err(TileError::CorruptData(format!(
            "compressed stream has {} bytes, header needs {}",
            input.len(),
            COMPRESSED_HEADER_SIZE
        )));
    }

    let mut header = &input[..COMPRESSED_HEADER_SIZE];
    let expected = header.get_u32() as usize;
    if expected > MAX_UNCOMPRESSED_SIZE {
        return Err(TileError::CorruptData(format!(
            "declared uncompressed size {} is implausible",
            expected
        )));
    }

    let mut raw = Vec::with_capacity(expected);
    ZlibDecoder::new(&input[COMPRESSED_HEADER_SIZE..])
        .read_to_end(&mut raw)
        .map_err(|e| TileError::CorruptData(format!("zlib stream: {}", e)))?;

    if raw.len() != expected {
        return Err(TileError::CorruptData(format!(
            "decompressed {} bytes, header declared {}",
            raw.len(),
            expected
        )));
    }
    Ok(raw)
}
