//! 3-D point and segment distance helpers

use serde::{Deserialize, Serialize};

use crate::core::types::Vec3;

/// Straight segment between two points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub p1: Vec3,
    pub p2: Vec3,
}

impl Segment {
    pub fn new(p1: Vec3, p2: Vec3) -> Self {
        Self { p1, p2 }
    }

    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    /// Unnormalized direction p1 -> p2
    pub fn vector(&self) -> Vec3 {
        self.p2 - self.p1
    }

    /// Point at parameter `t` (0 = p1, 1 = p2)
    pub fn point_at(&self, t: f64) -> Vec3 {
        self.p1 + self.vector() * t
    }
}

/// Closest points between two segments, plus their distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    pub on_a: Vec3,
    pub on_b: Vec3,
    pub distance: f64,
}

impl ClosestApproach {
    /// Crossing point when the segments touch within `eps`
    pub fn crossing(&self, eps: f64) -> Option<Vec3> {
        (self.distance <= eps).then(|| (self.on_a + self.on_b) * 0.5)
    }
}

/// True when two directions are parallel or anti-parallel within `eps`
pub fn is_parallel(a: Vec3, b: Vec3, eps: f64) -> bool {
    let a = a.normalize_or_zero();
    let b = b.normalize_or_zero();
    1.0 - a.dot(b).abs() < eps
}

/// Shortest distance from `point` to `segment`
pub fn point_to_segment(point: Vec3, segment: &Segment) -> f64 {
    let v = segment.vector();
    let len_sq = v.length_squared();
    if len_sq == 0.0 {
        return point.distance(segment.p1);
    }
    let t = ((point - segment.p1).dot(v) / len_sq).clamp(0.0, 1.0);
    point.distance(segment.point_at(t))
}

/// True when `point` lies on `segment` within `eps`
pub fn point_on_segment(point: Vec3, segment: &Segment, eps: f64) -> bool {
    point_to_segment(point, segment) <= eps
}

/// Closest approach between two segments
///
/// Clamped parametric solution; handles degenerate (zero-length) and
/// parallel segments.
pub fn closest_approach(a: &Segment, b: &Segment) -> ClosestApproach {
    let d1 = a.vector();
    let d2 = b.vector();
    let r = a.p1 - b.p1;
    let len_a = d1.length_squared();
    let len_b = d2.length_squared();
    let f = d2.dot(r);

    let (s, t) = if len_a <= f64::EPSILON && len_b <= f64::EPSILON {
        (0.0, 0.0)
    } else if len_a <= f64::EPSILON {
        (0.0, (f / len_b).clamp(0.0, 1.0))
    } else {
        let c = d1.dot(r);
        if len_b <= f64::EPSILON {
            ((-c / len_a).clamp(0.0, 1.0), 0.0)
        } else {
            let cross = d1.dot(d2);
            let denom = len_a * len_b - cross * cross;
            let mut s = if denom > f64::EPSILON * len_a * len_b {
                ((cross * f - c * len_b) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t = (cross * s + f) / len_b;
            if t < 0.0 {
                t = 0.0;
                s = (-c / len_a).clamp(0.0, 1.0);
            } else if t > 1.0 {
                t = 1.0;
                s = ((cross - c) / len_a).clamp(0.0, 1.0);
            }
            (s, t)
        }
    };

    let on_a = a.point_at(s);
    let on_b = b.point_at(t);
    ClosestApproach {
        on_a,
        on_b,
        distance: on_a.distance(on_b),
    }
}

/// Shortest distance between two segments
pub fn segment_to_segment(a: &Segment, b: &Segment) -> f64 {
    closest_approach(a, b).distance
}
