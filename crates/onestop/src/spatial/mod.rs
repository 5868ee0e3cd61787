//! Geohash encoding and point-set reduction.

pub mod centroid;
pub mod geohash;

pub use centroid::{CentroidReducer, MeanCentroid};
pub use geohash::{GEOHASH_PRECISION, neighbors_fit};
