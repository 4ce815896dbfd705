//! Axis-aligned bounding boxes.

use cgmath::{EuclideanSpace, Matrix4, Point3, Transform, Vector3, Zero};

/// Minimal axis-aligned box enclosing a set of points.
///
/// An empty box (no points added yet) has `min > max` on every axis. All
/// queries on an empty box return neutral values (origin center, zero size)
/// instead of infinities so callers never have to special-case it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn new(min: Point3<f32>, max: Point3<f32>) -> Self {
        Self { min, max }
    }

    pub fn from_center_size(center: Point3<f32>, size: Vector3<f32>) -> Self {
        let half = size / 2.0;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        let mut bounds = Self::empty();
        for point in points {
            bounds.expand_by_point(point);
        }
        bounds
    }

    pub fn is_empty(&self) -> bool {
        !(self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z)
    }

    pub fn expand_by_point(&mut self, point: Point3<f32>) {
        // NaN coordinates would poison every later comparison
        if !(point.x.is_finite() && point.y.is_finite() && point.z.is_finite()) {
            return;
        }
        self.min.x = self.min.x.min(point.x);
        self.min.y = self.min.y.min(point.y);
        self.min.z = self.min.z.min(point.z);
        self.max.x = self.max.x.max(point.x);
        self.max.y = self.max.y.max(point.y);
        self.max.z = self.max.z.max(point.z);
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        if other.is_empty() {
            return *self;
        }
        if self.is_empty() {
            return *other;
        }
        let mut merged = *self;
        merged.expand_by_point(other.min);
        merged.expand_by_point(other.max);
        merged
    }

    pub fn center(&self) -> Point3<f32> {
        if self.is_empty() {
            return Point3::origin();
        }
        self.min.midpoint(self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::zero();
        }
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }

    /// Bounds of this box after applying `matrix`, i.e. the box around its
    /// eight transformed corners.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Self {
        if self.is_empty() {
            return *self;
        }
        let (lo, hi) = (self.min, self.max);
        let corners = [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ];
        Self::from_points(corners.into_iter().map(|c| matrix.transform_point(c)))
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
