//! Base-32 geohash encoding and neighbourhood fitting.
//!
//! Coordinates follow the `geo` convention: `x` is longitude, `y` is latitude.

use geo::{coord, Point, Rect};

use crate::models::types::{OnestopError, Result};

const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Precision used when encoding points before fitting.
pub const GEOHASH_PRECISION: usize = 12;

/// Encode a point as a geohash of `precision` characters.
pub fn encode(point: Point, precision: usize) -> String {
    let (mut lat_lo, mut lat_hi) = (-90.0, 90.0);
    let (mut lon_lo, mut lon_hi) = (-180.0, 180.0);
    let mut hash = String::with_capacity(precision);
    let mut even = true;
    let mut bits = 0;
    let mut ch = 0usize;

    while hash.len() < precision {
        if even {
            let mid = (lon_lo + lon_hi) / 2.0;
            if point.x() >= mid {
                ch = ch * 2 + 1;
                lon_lo = mid;
            } else {
                ch *= 2;
                lon_hi = mid;
            }
        } else {
            let mid = (lat_lo + lat_hi) / 2.0;
            if point.y() >= mid {
                ch = ch * 2 + 1;
                lat_lo = mid;
            } else {
                ch *= 2;
                lat_hi = mid;
            }
        }
        even = !even;
        bits += 1;
        if bits == 5 {
            hash.push(BASE32[ch] as char);
            bits = 0;
            ch = 0;
        }
    }
    hash
}

/// Decode a geohash into the cell it names.
pub fn decode(hash: &str) -> Result<Rect> {
    let (mut lat_lo, mut lat_hi) = (-90.0, 90.0);
    let (mut lon_lo, mut lon_hi) = (-180.0, 180.0);
    let mut even = true;

    for c in hash.bytes() {
        let value = BASE32
            .iter()
            .position(|&b| b == c)
            .ok_or_else(|| OnestopError::InvalidData(format!("invalid geohash: {hash}")))?;
        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1 == 1;
            if even {
                let mid = (lon_lo + lon_hi) / 2.0;
                if bit {
                    lon_lo = mid;
                } else {
                    lon_hi = mid;
                }
            } else {
                let mid = (lat_lo + lat_hi) / 2.0;
                if bit {
                    lat_lo = mid;
                } else {
                    lat_hi = mid;
                }
            }
            even = !even;
        }
    }

    Ok(Rect::new(
        coord! { x: lon_lo, y: lat_lo },
        coord! { x: lon_hi, y: lat_hi },
    ))
}

/// The cell itself and its (up to) eight adjacent cells of the same size.
///
/// Longitude wraps at the antimeridian; rows beyond a pole are omitted.
pub fn neighbors(hash: &str) -> Result<Vec<String>> {
    let cell = decode(hash)?;
    let center = cell.center();
    let (width, height) = (cell.width(), cell.height());

    let mut out = Vec::with_capacity(9);
    for dy in [-1.0, 0.0, 1.0] {
        let y = center.y + dy * height;
        if !(-90.0..=90.0).contains(&y) {
            continue;
        }
        for dx in [-1.0, 0.0, 1.0] {
            let x = (center.x + dx * width + 180.0).rem_euclid(360.0) - 180.0;
            let neighbor = encode(Point::new(x, y), hash.len());
            if !out.contains(&neighbor) {
                out.push(neighbor);
            }
        }
    }
    Ok(out)
}

/// Longest prefix of the centroid's geohash whose 3x3 neighbourhood still
/// contains every point.
///
/// Never returns less than one character. Requires at least one point.
pub fn neighbors_fit(centroid: Point, points: &[Point]) -> Result<String> {
    if points.is_empty() {
        return Err(OnestopError::Centroid("no points to fit".into()));
    }

    let center = encode(centroid, GEOHASH_PRECISION);
    let hashes: Vec<String> = points
        .iter()
        .map(|&p| encode(p, GEOHASH_PRECISION))
        .collect();

    let mut fit = center.len().saturating_sub(1);
    for len in 1..center.len() {
        let cells = neighbors(&center[..len])?;
        let unbounded = hashes.iter().any(|h| !cells.iter().any(|c| c == &h[..len]));
        if unbounded {
            fit = len;
            break;
        }
    }

    Ok(center[..fit.saturating_sub(1).max(1)].to_string())
}
