//! Binary vector codec.
//!
//! Feature vectors cross the service boundary as packed little-endian
//! IEEE-754 `f32` values, four bytes per element, in element order. The same
//! layout is used for the BLOB column in storage.

use crate::error::{MediaError, Result};

const F32_WIDTH: usize = std::mem::size_of::<f32>();

/// Serialize a vector into `4 * values.len()` little-endian bytes.
pub fn encode(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * F32_WIDTH);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Deserialize and validate a vector.
///
/// Fails with [`MediaError::MalformedVector`] when the length is not a
/// multiple of four and with [`MediaError::InvalidVectorValue`] at the first
/// NaN or infinite element. Empty input decodes to an empty vector.
pub fn decode(data: &[u8]) -> Result<Vec<f32>> {
    let values = decode_unchecked(data)?;
    if let Some(index) = first_non_finite(&values) {
        return Err(MediaError::InvalidVectorValue { index });
    }
    Ok(values)
}

/// [`decode`] plus a dimensionality check.
pub fn decode_with_dimensions(data: &[u8], dimensions: usize) -> Result<Vec<f32>> {
    if data.len() % F32_WIDTH == 0 && data.len() / F32_WIDTH != dimensions {
        return Err(MediaError::DimensionMismatch {
            expected: dimensions,
            actual: data.len() / F32_WIDTH,
        });
    }
    decode(data)
}

/// Reinterpret bytes without the finiteness check.
///
/// Only for data that was validated before it was written, such as stored
/// BLOBs read back inside the storage engine.
pub fn decode_unchecked(data: &[u8]) -> Result<Vec<f32>> {
    if data.len() % F32_WIDTH != 0 {
        return Err(MediaError::MalformedVector { len: data.len() });
    }
    Ok(data
        .chunks_exact(F32_WIDTH)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Index of the first NaN or infinite element, if any.
pub fn first_non_finite(values: &[f32]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}
