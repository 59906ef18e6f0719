//! The axis-aligned generation domain and wall truncation

use serde::{Deserialize, Serialize};

use crate::core::types::{BoundaryFaces, Vec3};

/// Axis-aligned box centred at the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Full edge lengths along x, y, z
    pub size: [f64; 3],
}

impl Domain {
    pub fn new(size: [f64; 3]) -> Self {
        Self { size }
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::from_array(self.size) * 0.5
    }

    pub fn volume(&self) -> f64 {
        self.size.iter().product()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.size.iter().any(|s| !(*s > 0.0) || !s.is_finite()) {
            return Err(format!("domain size must be positive, got {:?}", self.size));
        }
        Ok(())
    }

    pub fn contains_point(&self, point: Vec3, eps: f64) -> bool {
        let half = self.half_extents();
        (0..3).all(|axis| point[axis].abs() <= half[axis] + eps)
    }

    pub fn contains_all(&self, points: &[Vec3], eps: f64) -> bool {
        points.iter().all(|p| self.contains_point(*p, eps))
    }

    /// Box translations are drawn from, enlarged by `increase`
    pub fn sampling_region(&self, increase: [f64; 3]) -> BoxRegion {
        let half = (Vec3::from_array(self.size) + Vec3::from_array(increase)) * 0.5;
        BoxRegion {
            min: (-half).to_array(),
            max: half.to_array(),
        }
    }

    /// Walls a point lies on, within `eps`
    pub fn faces_touched(&self, point: Vec3, eps: f64) -> BoundaryFaces {
        let half = self.half_extents();
        let mut faces = BoundaryFaces::NONE;
        for axis in 0..3 {
            if point[axis] >= half[axis] - eps {
                faces.insert(BoundaryFaces::face(axis, true));
            } else if point[axis] <= -half[axis] + eps {
                faces.insert(BoundaryFaces::face(axis, false));
            }
        }
        faces
    }

    fn on_wall(&self, point: Vec3, eps: f64) -> bool {
        !self.faces_touched(point, eps).is_empty()
    }
}

/// Axis-aligned sub-box, in world coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxRegion {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoxRegion {
    pub fn validate(&self) -> Result<(), String> {
        let ordered = (0..3).all(|i| self.min[i] < self.max[i]);
        let finite = self.min.iter().chain(self.max.iter()).all(|v| v.is_finite());
        if !ordered || !finite {
            return Err(format!("region min {:?} must lie below max {:?}", self.min, self.max));
        }
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        (0..3).map(|i| self.max[i] - self.min[i]).product()
    }

    /// Overlap with the domain, used when a region pokes outside the walls
    pub fn clamped_to(&self, domain: &Domain) -> BoxRegion {
        let half = domain.half_extents();
        let mut clamped = *self;
        for i in 0..3 {
            clamped.min[i] = self.min[i].max(-half[i]);
            clamped.max[i] = self.max[i].min(half[i]);
        }
        clamped
    }
}

/// Outcome of clipping a polygon against the domain walls
#[derive(Debug, Clone, PartialEq)]
pub enum Truncation {
    /// Fully inside; `faces` lists walls the outline merely touches
    Inside { faces: BoundaryFaces },
    Clipped { vertices: Vec<Vec3>, faces: BoundaryFaces },
    /// Nothing left inside the domain
    Outside,
    /// Clipping left fewer than three usable vertices
    Degenerate,
}

/// Clip a closed polygon against one wall (Sutherland-Hodgman step)
fn clip_against_wall(vertices: &[Vec3], axis: usize, sign: f64, limit: f64) -> Vec<Vec3> {
    let n = vertices.len();
    let inside = |p: &Vec3| sign * p[axis] <= limit;
    let mut clipped = Vec::with_capacity(n + 1);
    for i in 0..n {
        let prev = vertices[(i + n - 1) % n];
        let cur = vertices[i];
        let crossing = || {
            let t = (sign * limit - prev[axis]) / (cur[axis] - prev[axis]);
            let mut p = prev + (cur - prev) * t;
            // Pin exactly to the wall
            p[axis] = sign * limit;
            p
        };
        match (inside(&prev), inside(&cur)) {
            (true, true) => clipped.push(cur),
            (true, false) => clipped.push(crossing()),
            (false, true) => {
                clipped.push(crossing());
                clipped.push(cur);
            }
            (false, false) => {}
        }
    }
    clipped
}

/// Drop vertices that are closer than `min_edge` to their successor
///
/// When one of the pair lies on a wall, the other is removed so clipped
/// outlines stay flush with the domain.
fn collapse_short_edges(mut vertices: Vec<Vec3>, domain: &Domain, min_edge: f64, eps: f64) -> Vec<Vec3> {
    let mut i = 0;
    while i < vertices.len() && vertices.len() >= 3 {
        let next = (i + 1) % vertices.len();
        if vertices[i].distance(vertices[next]) < min_edge {
            if domain.on_wall(vertices[i], eps) {
                vertices.remove(next);
                if next < i {
                    i -= 1;
                }
            } else {
                vertices.remove(i);
            }
        } else {
            i += 1;
        }
    }
    vertices
}

/// Clip `vertices` to the domain
///
/// Edges of the clipped outline shorter than `2h` are collapsed; an outline
/// left with fewer than three vertices is degenerate.
pub fn truncate(vertices: &[Vec3], domain: &Domain, h: f64, eps: f64) -> Truncation {
    let faces_of = |points: &[Vec3]| {
        points
            .iter()
            .fold(BoundaryFaces::NONE, |acc, p| acc.union(domain.faces_touched(*p, eps)))
    };

    if domain.contains_all(vertices, eps) {
        return Truncation::Inside { faces: faces_of(vertices) };
    }

    let half = domain.half_extents();
    let mut clipped = vertices.to_vec();
    for axis in 0..3 {
        for sign in [1.0, -1.0] {
            clipped = clip_against_wall(&clipped, axis, sign, half[axis]);
            if clipped.is_empty() {
                return Truncation::Outside;
            }
        }
    }

    let clipped = collapse_short_edges(clipped, domain, 2.0 * h, eps);
    if clipped.len() < 3 {
        return Truncation::Degenerate;
    }
    let faces = faces_of(&clipped);
    Truncation::Clipped { vertices: clipped, faces }
}
