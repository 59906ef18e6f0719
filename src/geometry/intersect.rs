//! Polygon-polygon intersection in 3-D
//!
//! Two planar polygons meet along a segment of the line shared by their
//! planes. Each polygon's boundary crosses the other's plane at points on
//! that line; the intersection is the overlap of the two resulting
//! intervals.

use crate::core::types::Vec3;
use crate::geometry::distance::Segment;
use crate::geometry::shape::Shape;

/// Points where the closed polygon `vertices` crosses a plane
///
/// Vertices lying on the plane (within `eps`) are reported as-is; edges with
/// endpoints strictly on opposite sides contribute their interpolated
/// crossing.
pub fn plane_crossings(vertices: &[Vec3], plane_point: Vec3, plane_normal: Vec3, eps: f64) -> Vec<Vec3> {
    let n = vertices.len();
    let dist: Vec<f64> = vertices.iter().map(|v| (*v - plane_point).dot(plane_normal)).collect();
    let mut crossings = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        if dist[i].abs() <= eps {
            crossings.push(vertices[i]);
            continue;
        }
        if dist[j].abs() > eps && dist[i].signum() != dist[j].signum() {
            let t = dist[i] / (dist[i] - dist[j]);
            crossings.push(vertices[i] + (vertices[j] - vertices[i]) * t);
        }
    }
    crossings
}

/// Extreme crossings along `direction`, as (param, point) pairs
fn extent(points: &[Vec3], origin: Vec3, direction: Vec3) -> Option<((f64, Vec3), (f64, Vec3))> {
    let mut iter = points.iter().map(|p| ((*p - origin).dot(direction), *p));
    let first = iter.next()?;
    Some(iter.fold((first, first), |(lo, hi), cur| {
        (if cur.0 < lo.0 { cur } else { lo }, if cur.0 > hi.0 { cur } else { hi })
    }))
}

/// Intersection segment of two shapes, if any
///
/// Returns `None` for parallel planes and for polygons whose crossing
/// intervals do not overlap. A single touching point yields a zero-length
/// segment, left for the caller to reject as too short.
pub fn intersect(a: &Shape, b: &Shape, eps: f64) -> Option<Segment> {
    if !a.bbox.overlaps(&b.bbox, eps) {
        return None;
    }
    intersect_polygons(&a.vertices, a.normal, &b.vertices, b.normal, eps)
}

pub fn intersect_polygons(
    a: &[Vec3],
    normal_a: Vec3,
    b: &[Vec3],
    normal_b: Vec3,
    eps: f64,
) -> Option<Segment> {
    let direction = normal_a.cross(normal_b);
    if direction.length() <= eps {
        return None;
    }
    let direction = direction.normalize();

    let on_b_plane = plane_crossings(a, b[0], normal_b, eps);
    if on_b_plane.is_empty() {
        return None;
    }
    let on_a_plane = plane_crossings(b, a[0], normal_a, eps);
    if on_a_plane.is_empty() {
        return None;
    }

    let origin = on_b_plane[0];
    let (a_lo, a_hi) = extent(&on_b_plane, origin, direction)?;
    let (b_lo, b_hi) = extent(&on_a_plane, origin, direction)?;

    let lo = if a_lo.0 >= b_lo.0 { a_lo } else { b_lo };
    let hi = if a_hi.0 <= b_hi.0 { a_hi } else { b_hi };
    if hi.0 < lo.0 - eps {
        return None;
    }
    if hi.0 < lo.0 {
        return Some(Segment::new(lo.1, lo.1));
    }
    Some(Segment::new(lo.1, hi.1))
}
