//! Reduction of a point set to a single representative point.
//!
//! Aggregate entities (feeds, operators, routes) are anchored on the centroid
//! of the stops they serve. The reduction itself is pluggable so callers can
//! swap in a geodesic centroid or a remote geometry service.

use geo::{Centroid, MultiPoint, Point};

use crate::models::types::{OnestopError, Result};

/// Reduce a non-empty point set to one point.
///
/// Implementations must be deterministic for identical input order.
pub trait CentroidReducer {
    fn centroid(&self, points: &[Point]) -> Result<Point>;
}

/// Planar mean of the input coordinates.
#[derive(Clone, Copy, Debug, Default)]
pub struct MeanCentroid;

impl CentroidReducer for MeanCentroid {
    fn centroid(&self, points: &[Point]) -> Result<Point> {
        MultiPoint::new(points.to_vec())
            .centroid()
            .ok_or_else(|| OnestopError::Centroid("empty point set".into()))
    }
}

impl<F> CentroidReducer for F
where
    F: Fn(&[Point]) -> Result<Point>,
{
    fn centroid(&self, points: &[Point]) -> Result<Point> {
        self(points)
    }
}
