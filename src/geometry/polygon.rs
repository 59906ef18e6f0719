//! Planar polygon construction and validity checks
//!
//! Shapes are built flat in the xy-plane around the origin, twisted in-plane,
//! rotated so that +z maps onto the sampled normal, then translated.

use std::f64::consts::PI;

use glam::DQuat;

use crate::core::types::Vec3;
use crate::geometry::distance::{point_on_segment, Segment};

/// Axis-aligned bounds of a point set
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl BoundingBox {
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        Self { min, max }
    }

    /// True when the boxes overlap or are within `margin` of each other
    pub fn overlaps(&self, other: &Self, margin: f64) -> bool {
        (0..3).all(|axis| {
            self.min[axis] <= other.max[axis] + margin && other.min[axis] <= self.max[axis] + margin
        })
    }
}

/// Corners of an axis-aligned rectangle with half-widths `x_radius`, `y_radius`
pub fn rectangle_vertices(x_radius: f64, y_radius: f64) -> Vec<Vec3> {
    vec![
        Vec3::new(x_radius, y_radius, 0.0),
        Vec3::new(-x_radius, y_radius, 0.0),
        Vec3::new(-x_radius, -y_radius, 0.0),
        Vec3::new(x_radius, -y_radius, 0.0),
    ]
}

/// Parametric angles giving `points` vertices of roughly equal arc length
///
/// Integrates dθ/ds = 1/sqrt(b²cos²θ + a²sin²θ) with a two-stage Runge-Kutta
/// step, using Ramanujan's approximation for the unit ellipse circumference.
pub fn ellipse_thetas(aspect_ratio: f64, points: usize) -> Vec<f64> {
    let a = 1.0;
    let b = aspect_ratio;
    let h = ((a - b) / (a + b)).powi(2);
    let circumference = PI * (a + b) * (1.0 + 3.0 * h / (10.0 + (4.0 - 3.0 * h).sqrt()));
    let step = circumference / points as f64;
    let speed = |theta: f64| ((b * theta.cos()).powi(2) + (a * theta.sin()).powi(2)).sqrt();

    let mut thetas = Vec::with_capacity(points);
    thetas.push(0.0);
    for i in 1..points {
        let prev = thetas[i - 1];
        let k1 = step / speed(prev);
        let k2 = step / speed(prev + k1);
        thetas.push(prev + 0.5 * (k1 + k2));
    }
    thetas
}

pub fn ellipse_vertices(x_radius: f64, y_radius: f64, thetas: &[f64]) -> Vec<Vec3> {
    thetas
        .iter()
        .map(|t| Vec3::new(x_radius * t.cos(), y_radius * t.sin(), 0.0))
        .collect()
}

/// Rotation taking a flat xy-polygon to its final orientation
///
/// Twists by `beta` about +z, then takes +z onto `normal`.
pub fn orientation(beta: f64, normal: Vec3) -> DQuat {
    DQuat::from_rotation_arc(Vec3::Z, normal) * DQuat::from_rotation_z(beta)
}

/// Rotate flat vertices into place and translate them
pub fn place(flat: &[Vec3], beta: f64, normal: Vec3, translation: Vec3) -> Vec<Vec3> {
    let rotation = orientation(beta, normal);
    flat.iter().map(|v| rotation * *v + translation).collect()
}

/// Newell's normal; its length is twice the polygon area
pub fn newell_normal(vertices: &[Vec3]) -> Vec3 {
    let n = vertices.len();
    (0..n).fold(Vec3::ZERO, |acc, i| acc + vertices[i].cross(vertices[(i + 1) % n]))
}

pub fn area(vertices: &[Vec3]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    0.5 * newell_normal(vertices).length()
}

pub fn edges(vertices: &[Vec3]) -> impl Iterator<Item = Segment> + '_ {
    let n = vertices.len();
    (0..n).map(move |i| Segment::new(vertices[i], vertices[(i + 1) % n]))
}

/// Largest distance of any vertex from the plane through vertex 0
pub fn planarity_error(vertices: &[Vec3], normal: Vec3) -> f64 {
    let Some(origin) = vertices.first() else {
        return 0.0;
    };
    vertices
        .iter()
        .map(|v| (*v - *origin).dot(normal).abs())
        .fold(0.0, f64::max)
}

/// Coordinate axes to keep when projecting onto the polygon's plane
fn projection_axes(normal: Vec3) -> (usize, usize) {
    let n = normal.abs();
    if n.x >= n.y && n.x >= n.z {
        (1, 2)
    } else if n.y >= n.z {
        (2, 0)
    } else {
        (0, 1)
    }
}

fn project(vertices: &[Vec3], normal: Vec3) -> Vec<(f64, f64)> {
    let (u, v) = projection_axes(normal);
    vertices.iter().map(|p| (p[u], p[v])).collect()
}

fn cross_sign(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0)
}

/// Proper crossing of two 2-D segments (touching does not count)
fn segments_cross(a1: (f64, f64), a2: (f64, f64), b1: (f64, f64), b2: (f64, f64)) -> bool {
    let d1 = cross_sign(b1, b2, a1);
    let d2 = cross_sign(b1, b2, a2);
    let d3 = cross_sign(a1, a2, b1);
    let d4 = cross_sign(a1, a2, b2);
    ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
}

/// True when no two non-adjacent edges cross
pub fn is_simple(vertices: &[Vec3], normal: Vec3) -> bool {
    let n = vertices.len();
    if n < 4 {
        return n == 3;
    }
    let coords = project(vertices, normal);
    for i in 0..n {
        let a1 = coords[i];
        let a2 = coords[(i + 1) % n];
        for j in (i + 2)..n {
            // Skip adjacent edges
            if j == (i + n - 1) % n {
                continue;
            }
            if segments_cross(a1, a2, coords[j], coords[(j + 1) % n]) {
                return false;
            }
        }
    }
    true
}

/// Point-in-polygon for a point on (or near) the polygon's plane
///
/// Points within `eps` of the boundary count as inside.
pub fn contains_point(vertices: &[Vec3], normal: Vec3, point: Vec3, eps: f64) -> bool {
    if edges(vertices).any(|e| point_on_segment(point, &e, eps)) {
        return true;
    }
    let coords = project(vertices, normal);
    let (u, v) = projection_axes(normal);
    let (px, py) = (point[u], point[v]);

    let n = coords.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = coords[i];
        let (xj, yj) = coords[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// True when any edge of `a` properly crosses any edge of `b` in their shared plane
pub fn edges_cross(a: &[Vec3], b: &[Vec3], normal: Vec3) -> bool {
    let pa = project(a, normal);
    let pb = project(b, normal);
    let (na, nb) = (pa.len(), pb.len());
    (0..na).any(|i| {
        (0..nb).any(|j| segments_cross(pa[i], pa[(i + 1) % na], pb[j], pb[(j + 1) % nb]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_area() {
        let rect = rectangle_vertices(2.0, 1.0);
        assert!((area(&rect) - 8.0).abs() < 1e-12);
        assert!(is_simple(&rect, Vec3::Z));
    }

    #[test]
    fn test_bowtie_is_not_simple() {
        let bowtie = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert!(!is_simple(&bowtie, Vec3::Z));
    }

    #[test]
    fn test_ellipse_thetas_cover_circle() {
        let thetas = ellipse_thetas(1.0, 8);
        assert_eq!(thetas.len(), 8);
        for (i, t) in thetas.iter().enumerate() {
            assert!((t - i as f64 * PI / 4.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ellipse_area_approaches_analytic() {
        let thetas = ellipse_thetas(0.5, 64);
        let verts = ellipse_vertices(2.0, 1.0, &thetas);
        let exact = PI * 2.0 * 1.0;
        assert!((area(&verts) - exact).abs() / exact < 0.01);
        assert!(is_simple(&verts, Vec3::Z));
    }

    #[test]
    fn test_place_rotates_normal() {
        let normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let verts = place(&rectangle_vertices(1.0, 1.0), 0.3, normal, Vec3::new(5.0, 0.0, 0.0));
        let computed = newell_normal(&verts).normalize();
        assert!((computed.dot(normal).abs() - 1.0).abs() < 1e-9);
        assert!(planarity_error(&verts, normal) < 1e-12);
        assert!((area(&verts) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_contains_point() {
        let rect = rectangle_vertices(1.0, 1.0);
        assert!(contains_point(&rect, Vec3::Z, Vec3::new(0.2, -0.3, 0.0), 1e-9));
        assert!(contains_point(&rect, Vec3::Z, Vec3::new(1.0, 0.0, 0.0), 1e-9));
        assert!(!contains_point(&rect, Vec3::Z, Vec3::new(1.5, 0.0, 0.0), 1e-9));
    }

    #[test]
    fn test_bbox_overlap() {
        let a = BoundingBox::from_points(&rectangle_vertices(1.0, 1.0));
        let shifted: Vec<Vec3> = rectangle_vertices(1.0, 1.0)
            .into_iter()
            .map(|v| v + Vec3::new(2.5, 0.0, 0.0))
            .collect();
        let b = BoundingBox::from_points(&shifted);
        assert!(!a.overlaps(&b, 0.1));
        assert!(a.overlaps(&b, 0.6));
    }
}
