//! Cosine distance as an SQL scalar function.
//!
//! SQLite has no vector type, so stored BLOBs are compared by a
//! `cosine_distance(a, b)` function registered on every pooled connection.
//! Ranking queries compute `1 - cosine_distance(...)` and order by it.

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Name under which the distance function is registered.
pub const COSINE_DISTANCE_FN: &str = "cosine_distance";

/// Register `cosine_distance(blob, blob) -> REAL` on `conn`.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        COSINE_DISTANCE_FN,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let a = ctx
                .get_raw(0)
                .as_blob()
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            let b = ctx
                .get_raw(1)
                .as_blob()
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            cosine_distance_bytes(a, b).ok_or_else(|| {
                rusqlite::Error::UserFunctionError(
                    format!(
                        "cosine_distance: incompatible operands ({} and {} bytes)",
                        a.len(),
                        b.len()
                    )
                    .into(),
                )
            })
        },
    )
}

/// Cosine distance between two packed little-endian `f32` vectors.
///
/// Returns `None` when the operands differ in length or are not a whole
/// number of elements.
pub fn cosine_distance_bytes(a: &[u8], b: &[u8]) -> Option<f64> {
    if a.len() != b.len() || a.len() % 4 != 0 {
        return None;
    }
    Some(cosine_distance(&widen(a), &widen(b)))
}

fn widen(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
        .collect()
}

/// `1 - cos(a, b)`, in `[0, 2]`.
///
/// A zero vector has no direction; its distance to anything is 1.0
/// (similarity 0).
pub fn cosine_distance(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let cos = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - cos
}
